use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user in the remote directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

/// A row in the user directory.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub online: bool,
    /// Locally tracked count of messages announced by the incoming watcher
    /// since the thread with this user was last opened.
    pub unread_count: u32,
}

impl User {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            online: false,
            unread_count: 0,
        }
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }
}

/// A direct message between the local user and one remote user.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Option<i64>,
    pub sender_id: UserId,
    pub text: String,
    /// Server timestamp as sent on the wire.
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn new(sender_id: UserId, text: impl Into<String>) -> Self {
        Self {
            id: None,
            sender_id,
            text: text.into(),
            timestamp: None,
        }
    }

    /// `HH:MM` when the timestamp parses, the raw value otherwise.
    pub fn display_time(&self) -> Option<String> {
        let raw = self.timestamp.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.format("%H:%M").to_string());
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(parsed.format("%H:%M").to_string());
            }
        }
        Some(raw.to_string())
    }
}

/// Result of the "latest message" check used by the incoming watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestMessage {
    pub id: Option<i64>,
    pub sender_id: UserId,
    pub text: Option<String>,
    pub timestamp: Option<String>,
}

/// A document the local user can share into a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocument {
    pub id: i64,
    pub title: String,
    pub document_type: Option<String>,
}

impl KnowledgeDocument {
    pub fn label(&self) -> String {
        match &self.document_type {
            Some(kind) => format!("{} ({})", self.title, kind),
            None => self.title.clone(),
        }
    }
}

/// Which panel the open widget is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    UserList,
    Thread(UserId),
}

impl View {
    pub fn selected_user(&self) -> Option<UserId> {
        match self {
            View::UserList => None,
            View::Thread(id) => Some(*id),
        }
    }
}

/// Every repeating (or delayed) job the client schedules. At most one timer
/// of each kind is live at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Conversation-scoped history refresh.
    History,
    /// Launcher badge refresh while the widget is closed.
    UnreadBadge,
    /// Latest-message check while the user list is showing.
    Incoming,
    /// Row highlight toggle for the flashing user.
    Flash,
    /// Presence ping for the lifetime of the mount.
    Heartbeat,
    /// One-shot delay before hiding the search dropdown after blur.
    SearchHide,
}

impl TimerKind {
    pub const ALL: [TimerKind; 6] = [
        TimerKind::History,
        TimerKind::UnreadBadge,
        TimerKind::Incoming,
        TimerKind::Flash,
        TimerKind::Heartbeat,
        TimerKind::SearchHide,
    ];

    pub fn is_repeating(&self) -> bool {
        !matches!(self, TimerKind::SearchHide)
    }
}
