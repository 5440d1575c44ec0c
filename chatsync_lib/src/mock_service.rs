use crate::errors::{ChatSyncError, Result};
use crate::service::{MessageStore, UserDirectory};
use crate::types::{ChatMessage, KnowledgeDocument, LatestMessage, User, UserId};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One backend request, as recorded by [`MockChatService`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SearchUsers(String),
    ListUsers,
    UpdateActivity,
    SendMessage { to: UserId, text: String },
    FetchHistory(UserId),
    UnreadCount,
    MarkRead,
    LatestMessage,
    ListDocuments,
    ShareDocument { document_id: i64, to: UserId },
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: i64,
    sender: UserId,
    receiver: UserId,
    text: String,
    sent_at: String,
    read: bool,
}

/// In-memory chat backend used by tests and the demo mode of the front-ends.
#[derive(Debug)]
pub struct MockChatService {
    own_id: UserId,
    users: Arc<RwLock<Vec<User>>>,
    messages: Arc<RwLock<Vec<StoredMessage>>>,
    documents: Arc<RwLock<Vec<KnowledgeDocument>>>,
    calls: Arc<RwLock<Vec<Call>>>,
    failing: Arc<RwLock<bool>>,
    next_id: Arc<RwLock<i64>>,
}

impl MockChatService {
    pub fn new(own_id: impl Into<UserId>) -> Self {
        Self {
            own_id: own_id.into(),
            users: Arc::new(RwLock::new(Vec::new())),
            messages: Arc::new(RwLock::new(Vec::new())),
            documents: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(false)),
            next_id: Arc::new(RwLock::new(1)),
        }
    }

    pub async fn new_with_data() -> Self {
        let service = Self::new(1);
        service.setup_fake_data().await;
        service
    }

    async fn setup_fake_data(&self) {
        let mut users = self.users.write().await;
        users.push(User::new(1, "You").with_online(true));
        users.push(User::new(3, "Sarah Johnson").with_online(true));
        users.push(User::new(4, "Michael Chen").with_online(true));
        users.push(User::new(5, "Emily Rodriguez"));
        users.push(User::new(6, "David Kim"));
        users.push(User::new(7, "Ayesha").with_online(true));
        drop(users);

        let mut documents = self.documents.write().await;
        documents.push(KnowledgeDocument {
            id: 11,
            title: "Merger Agreement Draft".to_string(),
            document_type: Some("contract".to_string()),
        });
        documents.push(KnowledgeDocument {
            id: 12,
            title: "Indemnification Research".to_string(),
            document_type: Some("memo".to_string()),
        });
        drop(documents);

        self.push_message(UserId(3), self.own_id, "Hi! I need your help with the merger agreement review.")
            .await;
        self.push_message(self.own_id, UserId(3), "Sure! Which sections are you concerned about?")
            .await;
        self.push_message(UserId(3), self.own_id, "The indemnification clauses seem overly broad.")
            .await;
        self.mark_all_read().await;
    }

    pub fn own_id(&self) -> UserId {
        self.own_id
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.push(user);
    }

    pub async fn set_users(&self, users: Vec<User>) {
        *self.users.write().await = users;
    }

    pub async fn add_document(&self, document: KnowledgeDocument) {
        self.documents.write().await.push(document);
    }

    /// Store an unread message from `sender` to the local user, as if another
    /// client had just sent it.
    pub async fn push_incoming(&self, sender: impl Into<UserId>, text: &str) -> i64 {
        self.push_message(sender.into(), self.own_id, text).await
    }

    /// Make every following request fail with a 503 until turned off again.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    pub async fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.read().await.iter().filter(|call| matches(call)).count()
    }

    async fn push_message(&self, sender: UserId, receiver: UserId, text: &str) -> i64 {
        let mut next_id = self.next_id.write().await;
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        self.messages.write().await.push(StoredMessage {
            id,
            sender,
            receiver,
            text: text.to_string(),
            sent_at: format!("2024-01-01T09:{:02}:00", id % 60),
            read: sender == self.own_id,
        });
        id
    }

    async fn mark_all_read(&self) {
        let own_id = self.own_id;
        for message in self.messages.write().await.iter_mut() {
            if message.receiver == own_id {
                message.read = true;
            }
        }
    }

    async fn record(&self, call: Call) -> Result<()> {
        self.calls.write().await.push(call);
        if *self.failing.read().await {
            return Err(ChatSyncError::Status {
                status: 503,
                body: "mock backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl Clone for MockChatService {
    fn clone(&self) -> Self {
        Self {
            own_id: self.own_id,
            users: Arc::clone(&self.users),
            messages: Arc::clone(&self.messages),
            documents: Arc::clone(&self.documents),
            calls: Arc::clone(&self.calls),
            failing: Arc::clone(&self.failing),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for MockChatService {
    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.record(Call::SearchUsers(query.to_string())).await?;
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.id != self.own_id && u.username.to_lowercase().starts_with(&query))
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.record(Call::ListUsers).await?;
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| u.id != self.own_id).cloned().collect())
    }

    async fn update_activity(&self) -> Result<()> {
        self.record(Call::UpdateActivity).await
    }
}

#[async_trait::async_trait]
impl MessageStore for MockChatService {
    async fn send_message(&self, receiver: UserId, text: &str) -> Result<()> {
        self.record(Call::SendMessage {
            to: receiver,
            text: text.to_string(),
        })
        .await?;
        if !self.users.read().await.iter().any(|u| u.id == receiver) {
            return Err(ChatSyncError::UserNotFound(receiver));
        }
        self.push_message(self.own_id, receiver, text).await;
        Ok(())
    }

    async fn fetch_history(&self, with_user: UserId) -> Result<Vec<ChatMessage>> {
        self.record(Call::FetchHistory(with_user)).await?;
        let own_id = self.own_id;
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| {
                (m.sender == own_id && m.receiver == with_user)
                    || (m.sender == with_user && m.receiver == own_id)
            })
            .map(|m| ChatMessage {
                id: Some(m.id),
                sender_id: m.sender,
                text: m.text.clone(),
                timestamp: Some(m.sent_at.clone()),
            })
            .collect())
    }

    async fn unread_count(&self) -> Result<u32> {
        self.record(Call::UnreadCount).await?;
        let own_id = self.own_id;
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| m.receiver == own_id && !m.read)
            .count() as u32)
    }

    async fn mark_read(&self) -> Result<()> {
        self.record(Call::MarkRead).await?;
        self.mark_all_read().await;
        Ok(())
    }

    async fn latest_message(&self) -> Result<Option<LatestMessage>> {
        self.record(Call::LatestMessage).await?;
        let own_id = self.own_id;
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .rev()
            .find(|m| m.receiver == own_id && !m.read)
            .map(|m| LatestMessage {
                id: Some(m.id),
                sender_id: m.sender,
                text: Some(m.text.clone()),
                timestamp: Some(m.sent_at.clone()),
            }))
    }

    async fn list_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        self.record(Call::ListDocuments).await?;
        Ok(self.documents.read().await.clone())
    }

    async fn share_document(&self, document_id: i64, receiver: UserId) -> Result<()> {
        self.record(Call::ShareDocument {
            document_id,
            to: receiver,
        })
        .await?;
        let title = self
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.title.clone())
            .ok_or_else(|| ChatSyncError::Rejected(format!("Document not found: {}", document_id)))?;
        self.push_message(self.own_id, receiver, &format!("[Shared Data Knowledge] {}", title))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_prefix_and_excludes_self() {
        let service = MockChatService::new_with_data().await;
        let found = service.search_users("s").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "Sarah Johnson");

        assert!(service.search_users("").await.unwrap().is_empty());
        assert!(service.search_users("   ").await.unwrap().is_empty());
        assert!(service.search_users("yo").await.unwrap().is_empty());
        assert!(service.search_users("ali").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incoming_counts_until_marked_read() {
        let service = MockChatService::new_with_data().await;
        assert_eq!(service.unread_count().await.unwrap(), 0);
        assert!(service.latest_message().await.unwrap().is_none());

        service.push_incoming(7, "are you free?").await;
        service.push_incoming(4, "ping").await;
        assert_eq!(service.unread_count().await.unwrap(), 2);
        let latest = service.latest_message().await.unwrap().unwrap();
        assert_eq!(latest.sender_id, UserId(4));

        service.mark_read().await.unwrap();
        assert_eq!(service.unread_count().await.unwrap(), 0);
        assert!(service.latest_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_appends_to_history() {
        let service = MockChatService::new_with_data().await;
        service.send_message(UserId(7), "hello Ayesha").await.unwrap();
        let history = service.fetch_history(UserId(7)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_id, UserId(1));
        assert_eq!(history[0].text, "hello Ayesha");

        let err = service.send_message(UserId(99), "nobody").await.unwrap_err();
        assert!(matches!(err, ChatSyncError::UserNotFound(UserId(99))));
    }

    #[tokio::test]
    async fn test_failure_injection_is_recorded() {
        let service = MockChatService::new(1);
        service.set_failing(true).await;
        assert!(service.list_users().await.is_err());
        service.set_failing(false).await;
        assert!(service.list_users().await.is_ok());
        assert_eq!(service.calls().await, vec![Call::ListUsers, Call::ListUsers]);
    }

    #[tokio::test]
    async fn test_share_document_posts_into_thread() {
        let service = MockChatService::new_with_data().await;
        service.share_document(11, UserId(3)).await.unwrap();
        let history = service.fetch_history(UserId(3)).await.unwrap();
        assert!(history.last().unwrap().text.contains("Merger Agreement Draft"));
        assert!(service.share_document(999, UserId(3)).await.is_err());
    }
}
