use crate::types::{User, UserId};

pub const NO_USERS_FOUND: &str = "No users found";

/// Keys the search dropdown reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Enter,
}

/// What the dropdown should render.
#[derive(Debug, Clone, PartialEq)]
pub enum Dropdown<'a> {
    Hidden,
    NoMatches,
    Rows(Vec<DropdownRow<'a>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropdownRow<'a> {
    pub user: &'a User,
    pub highlighted: bool,
}

/// Conversation selector: search field plus result dropdown.
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    query: String,
    results: Vec<User>,
    highlighted: Option<usize>,
    visible: bool,
    focused: bool,
}

impl UserSearch {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[User] {
        &self.results
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.highlighted = None;
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.highlighted = None;
    }

    /// Apply a search response. An empty result for an empty query keeps the
    /// dropdown hidden so first focus never flashes an empty panel.
    pub fn apply_results(&mut self, results: Vec<User>) {
        self.results = results;
        self.highlighted = None;
        self.visible = self.focused && !(self.results.is_empty() && self.query.trim().is_empty());
    }

    /// Move the highlight; returns the user to select on Enter.
    pub fn navigate(&mut self, key: NavKey) -> Option<UserId> {
        if !self.visible {
            return None;
        }
        match key {
            NavKey::Down => {
                if let Some(last) = self.results.len().checked_sub(1) {
                    self.highlighted = Some(self.highlighted.map_or(0, |i| (i + 1).min(last)));
                }
                None
            }
            NavKey::Up => {
                if !self.results.is_empty() {
                    self.highlighted = Some(self.highlighted.map_or(0, |i| i.saturating_sub(1)));
                }
                None
            }
            NavKey::Enter => self
                .highlighted
                .and_then(|i| self.results.get(i))
                .map(|u| u.id),
        }
    }

    pub fn find(&self, id: UserId) -> Option<&User> {
        self.results.iter().find(|u| u.id == id)
    }

    /// Close the dropdown after a selection, showing the chosen name.
    pub fn select(&mut self, id: UserId) {
        if let Some(user) = self.find(id) {
            self.query = user.username.clone();
        }
        self.hide();
    }

    pub fn dropdown(&self) -> Dropdown<'_> {
        if !self.visible {
            return Dropdown::Hidden;
        }
        if self.results.is_empty() {
            return Dropdown::NoMatches;
        }
        Dropdown::Rows(
            self.results
                .iter()
                .enumerate()
                .map(|(i, user)| DropdownRow {
                    user,
                    highlighted: self.highlighted == Some(i),
                })
                .collect(),
        )
    }
}
