use crate::types::{User, UserId};

/// Highlight state of the row that just received a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flash {
    pub user: UserId,
    pub lit: bool,
}

/// The directory shown when no conversation is selected.
#[derive(Debug, Clone, Default)]
pub struct UserList {
    users: Vec<User>,
    loaded: bool,
}

impl UserList {
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// True once a listing has been received.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn find(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.find(id).is_some()
    }

    pub fn online_count(&self) -> usize {
        self.users.iter().filter(|u| u.online).count()
    }

    pub fn offline_count(&self) -> usize {
        self.users.len() - self.online_count()
    }

    /// Take a fresh listing in server order. Unread counts tracked locally
    /// survive the refresh.
    pub fn replace(&mut self, users: Vec<User>) {
        let previous = std::mem::take(&mut self.users);
        self.users = users
            .into_iter()
            .map(|mut user| {
                if let Some(old) = previous.iter().find(|p| p.id == user.id) {
                    user.unread_count = old.unread_count;
                }
                user
            })
            .collect();
        self.loaded = true;
    }

    /// Stable move of `id` to index 0. Returns false if the user is unknown.
    pub fn promote(&mut self, id: UserId) -> bool {
        match self.users.iter().position(|u| u.id == id) {
            Some(index) => {
                let user = self.users.remove(index);
                self.users.insert(0, user);
                true
            }
            None => false,
        }
    }

    pub fn bump_unread(&mut self, id: UserId) {
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.unread_count = user.unread_count.saturating_add(1);
        }
    }

    pub fn clear_unread(&mut self, id: UserId) {
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.unread_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &UserList) -> Vec<&str> {
        list.users().iter().map(|u| u.username.as_str()).collect()
    }

    fn sample() -> UserList {
        let mut list = UserList::default();
        list.replace(vec![
            User::new(3, "Sarah").with_online(true),
            User::new(4, "Michael"),
            User::new(7, "Ayesha").with_online(true),
            User::new(5, "Emily"),
        ]);
        list
    }

    #[test]
    fn test_promote_is_a_stable_move() {
        let mut list = sample();
        assert!(list.promote(UserId(7)));
        assert_eq!(names(&list), vec!["Ayesha", "Sarah", "Michael", "Emily"]);

        assert!(list.promote(UserId(7)));
        assert_eq!(names(&list), vec!["Ayesha", "Sarah", "Michael", "Emily"]);

        assert!(!list.promote(UserId(99)));
    }

    #[test]
    fn test_replace_keeps_local_unread() {
        let mut list = sample();
        list.bump_unread(UserId(4));
        list.bump_unread(UserId(4));
        list.replace(vec![User::new(4, "Michael").with_online(true), User::new(6, "David")]);
        assert_eq!(list.find(UserId(4)).map(|u| u.unread_count), Some(2));
        assert_eq!(list.find(UserId(6)).map(|u| u.unread_count), Some(0));
        assert!(!list.contains(UserId(3)));

        list.clear_unread(UserId(4));
        assert_eq!(list.find(UserId(4)).map(|u| u.unread_count), Some(0));
    }

    #[test]
    fn test_presence_counts() {
        let list = sample();
        assert_eq!(list.online_count(), 2);
        assert_eq!(list.offline_count(), 2);
        assert!(list.is_loaded());
        assert!(!UserList::default().is_loaded());
    }
}
