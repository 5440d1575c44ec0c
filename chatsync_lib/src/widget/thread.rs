use super::scroll::ScrollState;
use crate::types::{ChatMessage, UserId};

pub const NO_MESSAGES: &str = "No messages yet.";

/// One rendered message row.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadLine {
    pub own: bool,
    pub sender: String,
    pub text: String,
    pub time: Option<String>,
}

/// Message history with one remote user.
#[derive(Debug, Clone)]
pub struct Thread {
    with: UserId,
    messages: Vec<ChatMessage>,
    /// Own messages sent since the last fetch, shown after the history.
    pending: Vec<String>,
    loaded: bool,
    scroll: ScrollState,
}

impl Thread {
    pub fn new(with: UserId) -> Self {
        Self {
            with,
            messages: Vec::new(),
            pending: Vec::new(),
            loaded: false,
            scroll: ScrollState::default(),
        }
    }

    pub fn with_user(&self) -> UserId {
        self.with
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn scroll_mut(&mut self) -> &mut ScrollState {
        &mut self.scroll
    }

    /// Full replacement from a history fetch. One row per message.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.pending.clear();
        self.loaded = true;
        self.scroll.replace_content(self.rows());
    }

    /// Optimistic local echo of a sent message, shown until the next fetch.
    pub fn push_pending(&mut self, text: impl Into<String>) {
        self.pending.push(text.into());
        self.scroll.replace_content(self.rows());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.pending.is_empty()
    }

    fn rows(&self) -> u16 {
        u16::try_from(self.messages.len() + self.pending.len()).unwrap_or(u16::MAX)
    }
}
