
use chatsync_lib::{
    with_retry, ChatMessage, ChatSyncClient, ChatSyncConfig, ChatSyncError, HttpChatService,
    KnowledgeDocument, LatestMessage, MessageStore, PollIntervals, RetryPolicy, User,
    UserDirectory, UserId, View,
};
use chatsync_lib::widget::FetchKind;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::EphemeralBackend;

async fn backend() -> EphemeralBackend {
    let backend = EphemeralBackend::start(1)
        .await
        .expect("Failed to start ephemeral backend");
    backend.add_user(1, "Me", true);
    backend.add_user(3, "Sarah Johnson", true);
    backend.add_user(7, "Ayesha", false);
    backend
}

fn service(backend: &EphemeralBackend) -> HttpChatService {
    let config = ChatSyncConfig::with_base_url(backend.url())
        .current_user(1)
        .session("session=test-cookie");
    HttpChatService::new(&config).expect("Failed to build HTTP service")
}

#[tokio::test]
async fn test_search_and_list_users() {
    let backend = backend().await;
    let service = service(&backend);

    let found = service.search_users("ay").await.expect("search failed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, UserId(7));
    assert_eq!(found[0].username, "Ayesha");

    assert!(service.search_users("").await.expect("search failed").is_empty());

    let all = service.list_users().await.expect("list failed");
    let names: Vec<&str> = all.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["Sarah Johnson", "Ayesha"]);
    assert!(all[0].online);
    assert!(!all[1].online);
}

#[tokio::test]
async fn test_session_cookie_sent_with_every_request() {
    let backend = backend().await;
    let service = service(&backend);
    service.list_users().await.expect("list failed");
    service.update_activity().await.expect("ping failed");
    assert_eq!(backend.cookies(), vec!["session=test-cookie", "session=test-cookie"]);
}

#[tokio::test]
async fn test_send_and_fetch_history() {
    let backend = backend().await;
    let service = service(&backend);
    backend.push_message(3, 1, "Hi there");

    service.send_message(UserId(3), "Hello Sarah").await.expect("send failed");
    let history = service.fetch_history(UserId(3)).await.expect("history failed");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, UserId(3));
    assert_eq!(history[1].text, "Hello Sarah");
    assert_eq!(history[1].sender_id, UserId(1));
    assert_eq!(history[0].display_time().as_deref(), Some("10:01"));
}

#[tokio::test]
async fn test_send_to_unknown_user_is_rejected() {
    let backend = backend().await;
    let service = service(&backend);
    let err = service.send_message(UserId(99), "anyone?").await.unwrap_err();
    match err {
        ChatSyncError::Rejected(reason) => assert_eq!(reason, "User not found"),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unread_latest_and_mark_read() {
    let backend = backend().await;
    let service = service(&backend);
    assert_eq!(service.unread_count().await.expect("unread failed"), 0);
    assert!(service.latest_message().await.expect("latest failed").is_none());

    backend.push_message(7, 1, "are you there?");
    assert_eq!(service.unread_count().await.expect("unread failed"), 1);
    let latest = service
        .latest_message()
        .await
        .expect("latest failed")
        .expect("no latest message");
    assert_eq!(latest.sender_id, UserId(7));
    assert_eq!(latest.text.as_deref(), Some("are you there?"));

    service.mark_read().await.expect("mark read failed");
    assert_eq!(service.unread_count().await.expect("unread failed"), 0);
}

#[tokio::test]
async fn test_documents_and_sharing() {
    let backend = backend().await;
    backend.add_document(11, "Merger Agreement Draft");
    let service = service(&backend);

    let documents = service.list_documents().await.expect("documents failed");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].label(), "Merger Agreement Draft (memo)");

    service.share_document(11, UserId(3)).await.expect("share failed");
    let history = service.fetch_history(UserId(3)).await.expect("history failed");
    assert_eq!(history[0].text, "[Shared Data Knowledge] Merger Agreement Draft");

    assert!(matches!(
        service.share_document(404, UserId(3)).await,
        Err(ChatSyncError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_server_errors_map_to_status() {
    let backend = backend().await;
    let service = service(&backend);
    backend.set_failing(true);
    match service.unread_count().await {
        Err(ChatSyncError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "backend down");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    let config = ChatSyncConfig::with_base_url("http://127.0.0.1:1").retry(RetryPolicy::none());
    let service = HttpChatService::new(&config).expect("Failed to build HTTP service");
    let err = service.list_users().await.unwrap_err();
    assert!(err.is_transient(), "expected a connect error, got {:?}", err);
}

#[tokio::test]
async fn test_client_drives_http_backend() {
    let backend = backend().await;
    backend.push_message(3, 1, "Morning!");
    let config = ChatSyncConfig::with_base_url(backend.url())
        .current_user(1)
        .intervals(PollIntervals {
            history: Duration::from_millis(50),
            ..PollIntervals::default()
        });
    let service = Arc::new(HttpChatService::new(&config).expect("Failed to build HTTP service"));
    let mut client = ChatSyncClient::new(service, &config);

    client.mount();
    client.open();
    client.open_thread(UserId(3));

    let loaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let widget = client.widget();
            let ready = widget.thread().map_or(false, |t| t.is_loaded())
                && widget.directory().is_loaded()
                && backend.count("POST /api/chat/mark_read") == 1
                && backend.count("POST /api/user/update_activity") == 1;
            if ready {
                break;
            }
            client.next().await;
        }
    })
    .await;
    assert!(loaded.is_ok(), "history never arrived");
    assert_eq!(client.widget().view(), View::Thread(UserId(3)));
    let lines = client.widget().thread_lines();
    assert_eq!(lines[0].sender, "Sarah Johnson");
    assert_eq!(lines[0].text, "Morning!");

    assert_eq!(backend.count("POST /api/chat/mark_read"), 1);
    assert_eq!(backend.count("POST /api/user/update_activity"), 1);
}

/// Nothing listens here, so every request fails to connect.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
    }
}

fn unreachable_service() -> HttpChatService {
    let config = ChatSyncConfig::with_base_url(UNREACHABLE).current_user(1);
    HttpChatService::new(&config).expect("Failed to build HTTP service")
}

#[tokio::test]
async fn test_connect_failure_retried_up_to_limit() {
    let service = unreachable_service();
    let attempts = AtomicU32::new(0);

    let result = with_retry(fast_retry(), || {
        attempts.fetch_add(1, Ordering::SeqCst);
        service.list_users()
    })
    .await;

    let err = result.expect_err("nothing should be listening");
    assert!(err.is_transient(), "expected a connect error, got {err}");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// Forwards to an HTTP service and records which calls were attempted.
#[derive(Debug)]
struct CountingBackend {
    inner: HttpChatService,
    calls: Mutex<Vec<&'static str>>,
}

impl CountingBackend {
    fn new(inner: HttpChatService) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

#[async_trait::async_trait]
impl UserDirectory for CountingBackend {
    async fn search_users(&self, query: &str) -> chatsync_lib::Result<Vec<User>> {
        self.record("search_users");
        self.inner.search_users(query).await
    }

    async fn list_users(&self) -> chatsync_lib::Result<Vec<User>> {
        self.record("list_users");
        self.inner.list_users().await
    }

    async fn update_activity(&self) -> chatsync_lib::Result<()> {
        self.record("update_activity");
        self.inner.update_activity().await
    }
}

#[async_trait::async_trait]
impl MessageStore for CountingBackend {
    async fn send_message(&self, receiver: UserId, text: &str) -> chatsync_lib::Result<()> {
        self.record("send_message");
        self.inner.send_message(receiver, text).await
    }

    async fn fetch_history(&self, with_user: UserId) -> chatsync_lib::Result<Vec<ChatMessage>> {
        self.record("fetch_history");
        self.inner.fetch_history(with_user).await
    }

    async fn unread_count(&self) -> chatsync_lib::Result<u32> {
        self.record("unread_count");
        self.inner.unread_count().await
    }

    async fn mark_read(&self) -> chatsync_lib::Result<()> {
        self.record("mark_read");
        self.inner.mark_read().await
    }

    async fn latest_message(&self) -> chatsync_lib::Result<Option<LatestMessage>> {
        self.record("latest_message");
        self.inner.latest_message().await
    }

    async fn list_documents(&self) -> chatsync_lib::Result<Vec<KnowledgeDocument>> {
        self.record("list_documents");
        self.inner.list_documents().await
    }

    async fn share_document(&self, document_id: i64, receiver: UserId) -> chatsync_lib::Result<()> {
        self.record("share_document");
        self.inner.share_document(document_id, receiver).await
    }
}

#[tokio::test]
async fn test_send_and_ping_not_retried_on_connect_failure() {
    let config = ChatSyncConfig::with_base_url(UNREACHABLE)
        .current_user(1)
        .retry(fast_retry());
    let backend = Arc::new(CountingBackend::new(unreachable_service()));
    let mut client = ChatSyncClient::new(backend.clone(), &config);

    client.mount();
    client.open();
    client.open_thread(UserId(3));
    client.send("hello?");

    let failed = tokio::time::timeout(Duration::from_secs(5), async {
        let mut send_failed = false;
        loop {
            send_failed |= client
                .widget()
                .last_error()
                .map_or(false, |e| e.kind == FetchKind::Send);
            if send_failed && backend.count("list_users") >= 3 {
                break;
            }
            client.next().await;
        }
    })
    .await;
    assert!(failed.is_ok(), "requests never settled");

    // Give any stray retry time to show up.
    let _ = tokio::time::timeout(Duration::from_millis(200), async {
        while client.next().await {}
    })
    .await;

    assert_eq!(backend.count("send_message"), 1);
    assert_eq!(backend.count("update_activity"), 1);
    assert_eq!(client.widget().input(), "hello?");
}
