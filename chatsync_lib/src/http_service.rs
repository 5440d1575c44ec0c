use crate::config::ChatSyncConfig;
use crate::errors::{ChatSyncError, Result};
use crate::service::{MessageStore, UserDirectory};
use crate::types::{ChatMessage, KnowledgeDocument, LatestMessage, User, UserId};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    username: String,
    #[serde(default)]
    online: bool,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        User::new(wire.id, wire.username).with_online(wire.online)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: Option<i64>,
    sender_id: UserId,
    #[serde(default)]
    message: String,
    #[serde(default, alias = "sent_at")]
    timestamp: Option<String>,
}

impl From<WireMessage> for ChatMessage {
    fn from(wire: WireMessage) -> Self {
        ChatMessage {
            id: wire.id,
            sender_id: wire.sender_id,
            text: wire.message,
            timestamp: wire.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    receiver_id: UserId,
}

#[derive(Debug, Serialize)]
struct ShareRequest {
    doc_id: i64,
    receiver_id: UserId,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnreadResponse {
    #[serde(default)]
    unread: u32,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    new_message: Option<WireLatest>,
}

#[derive(Debug, Deserialize)]
struct WireLatest {
    sender_id: UserId,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "sent_at")]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    id: i64,
    title: String,
    #[serde(default)]
    document_type: Option<String>,
}

/// Chat backend reached over the REST API.
#[derive(Debug, Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatService {
    pub fn new(config: &ChatSyncConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ChatSyncError::InvalidConfig(format!("session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        decode(response).await
    }

    async fn call_success(&self, request: RequestBuilder) -> Result<()> {
        let reply: SuccessResponse = self.call(request).await?;
        if reply.success {
            Ok(())
        } else {
            Err(ChatSyncError::Rejected(
                reply.error.unwrap_or_else(|| "server reported failure".to_string()),
            ))
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatSyncError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        // Fire-and-forget endpoints may answer with an empty body.
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl UserDirectory for HttpChatService {
    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let request = self
            .client
            .get(self.url("/api/users/search"))
            .query(&[("q", query)]);
        let reply: UsersResponse = self.call(request).await?;
        Ok(reply.users.into_iter().map(User::from).collect())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let reply: UsersResponse = self.call(self.client.get(self.url("/api/users/all"))).await?;
        Ok(reply.users.into_iter().map(User::from).collect())
    }

    async fn update_activity(&self) -> Result<()> {
        let _: serde_json::Value = self
            .call(self.client.post(self.url("/api/user/update_activity")))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for HttpChatService {
    async fn send_message(&self, receiver: UserId, text: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url("/api/chat/send"))
            .json(&SendRequest {
                message: text,
                receiver_id: receiver,
            });
        self.call_success(request).await
    }

    async fn fetch_history(&self, with_user: UserId) -> Result<Vec<ChatMessage>> {
        let request = self
            .client
            .get(self.url("/api/chat/history"))
            .query(&[("with_user", with_user.0)]);
        let reply: HistoryResponse = self.call(request).await?;
        Ok(reply.messages.into_iter().map(ChatMessage::from).collect())
    }

    async fn unread_count(&self) -> Result<u32> {
        let reply: UnreadResponse = self
            .call(self.client.get(self.url("/api/chat/unread_count")))
            .await?;
        Ok(reply.unread)
    }

    async fn mark_read(&self) -> Result<()> {
        let _: serde_json::Value = self
            .call(self.client.post(self.url("/api/chat/mark_read")))
            .await?;
        Ok(())
    }

    async fn latest_message(&self) -> Result<Option<LatestMessage>> {
        let reply: LatestResponse = self
            .call(self.client.get(self.url("/api/chat/last_message")))
            .await?;
        Ok(reply.new_message.map(|wire| LatestMessage {
            id: wire.id,
            sender_id: wire.sender_id,
            text: wire.message,
            timestamp: wire.timestamp,
        }))
    }

    async fn list_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        let reply: DocumentsResponse = self
            .call(self.client.get(self.url("/api/knowledge-base/my-documents")))
            .await?;
        Ok(reply
            .documents
            .into_iter()
            .map(|wire| KnowledgeDocument {
                id: wire.id,
                title: wire.title,
                document_type: wire.document_type,
            })
            .collect())
    }

    async fn share_document(&self, document_id: i64, receiver: UserId) -> Result<()> {
        let request = self
            .client
            .post(self.url("/api/knowledge-base/share"))
            .json(&ShareRequest {
                doc_id: document_id,
                receiver_id: receiver,
            });
        self.call_success(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_accepts_sent_at() {
        let reply: HistoryResponse = serde_json::from_str(
            r#"{"messages": [
                {"sender_id": 3, "receiver_id": 1, "message": "hello", "sent_at": "2024-05-01T10:00:00"},
                {"id": 9, "sender_id": 1, "message": "hi", "timestamp": "2024-05-01T10:01:00"}
            ]}"#,
        )
        .unwrap();
        let messages: Vec<ChatMessage> = reply.messages.into_iter().map(ChatMessage::from).collect();
        assert_eq!(messages[0].sender_id, UserId(3));
        assert_eq!(messages[0].timestamp.as_deref(), Some("2024-05-01T10:00:00"));
        assert_eq!(messages[1].id, Some(9));
    }

    #[test]
    fn test_missing_lists_decode_as_empty() {
        let users: UsersResponse = serde_json::from_str(r#"{"error": "Not authenticated"}"#).unwrap();
        assert!(users.users.is_empty());
        let latest: LatestResponse = serde_json::from_str(r#"{"new_message": null}"#).unwrap();
        assert!(latest.new_message.is_none());
        let unread: UnreadResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(unread.unread, 0);
    }

    #[test]
    fn test_search_users_default_offline() {
        let reply: UsersResponse =
            serde_json::from_str(r#"{"users": [{"id": 7, "username": "Ayesha"}]}"#).unwrap();
        let user = User::from(reply.users.into_iter().next().unwrap());
        assert_eq!(user, User::new(7, "Ayesha"));
    }

    #[test]
    fn test_invalid_cookie_is_a_config_error() {
        let config = ChatSyncConfig::default().session("bad\ncookie");
        let err = HttpChatService::new(&config).unwrap_err();
        assert!(matches!(err, ChatSyncError::InvalidConfig(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let service = HttpChatService::new(&ChatSyncConfig::with_base_url("http://host:1/")).unwrap();
        assert_eq!(service.base_url(), "http://host:1");
        assert_eq!(service.url("/api/users/all"), "http://host:1/api/users/all");
    }
}
