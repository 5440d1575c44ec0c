use crate::errors::Result;
use crate::types::{ChatMessage, KnowledgeDocument, LatestMessage, User, UserId};

/// Remote user directory: search, full listing and presence.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Filtered search used by the conversation selector.
    async fn search_users(&self, query: &str) -> Result<Vec<User>>;
    /// Full listing used by the user list view.
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Presence heartbeat.
    async fn update_activity(&self) -> Result<()>;
}

/// Remote direct-message store.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    async fn send_message(&self, receiver: UserId, text: &str) -> Result<()>;
    async fn fetch_history(&self, with_user: UserId) -> Result<Vec<ChatMessage>>;
    async fn unread_count(&self) -> Result<u32>;
    async fn mark_read(&self) -> Result<()>;
    /// Most recent message addressed to the local user, if any is pending.
    async fn latest_message(&self) -> Result<Option<LatestMessage>>;
    async fn list_documents(&self) -> Result<Vec<KnowledgeDocument>>;
    async fn share_document(&self, document_id: i64, receiver: UserId) -> Result<()>;
}

/// Everything the sync client talks to.
pub trait ChatBackend: UserDirectory + MessageStore {}

impl<T: UserDirectory + MessageStore> ChatBackend for T {}
