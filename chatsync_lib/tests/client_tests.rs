use chatsync_lib::widget::{Dropdown, FetchKind, Flash};
use chatsync_lib::{
    Call, ChatSyncClient, ChatSyncConfig, MockChatService, Msg, RetryPolicy, TimerKind, UserId,
};
use std::sync::Arc;
use std::time::Duration;

const SARAH: UserId = UserId(3);
const AYESHA: UserId = UserId(7);

async fn setup() -> (MockChatService, ChatSyncClient) {
    let mock = MockChatService::new_with_data().await;
    let config = ChatSyncConfig::new().current_user(1).retry(RetryPolicy::none());
    let client = ChatSyncClient::new(Arc::new(mock.clone()), &config);
    (mock, client)
}

/// Move the paused clock forward in small steps, applying every tick and
/// response along the way.
async fn advance(client: &mut ChatSyncClient, by: Duration) {
    let step = Duration::from_millis(100);
    let mut remaining = by;
    while !remaining.is_zero() {
        let delta = remaining.min(step);
        tokio::time::advance(delta).await;
        client.settle().await;
        remaining -= delta;
    }
}

async fn history_calls(mock: &MockChatService) -> Vec<UserId> {
    mock.calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            Call::FetchHistory(with) => Some(with),
            _ => None,
        })
        .collect()
}

fn names(client: &ChatSyncClient) -> Vec<String> {
    client
        .widget()
        .directory()
        .users()
        .iter()
        .map(|u| u.username.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_switching_threads_leaves_one_history_poll() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.open_thread(SARAH);
    client.open_thread(AYESHA);
    client.settle().await;
    mock.clear_calls().await;

    advance(&mut client, Duration::from_millis(2050)).await;
    assert_eq!(history_calls(&mock).await, vec![AYESHA]);

    advance(&mut client, Duration::from_millis(2000)).await;
    assert_eq!(history_calls(&mock).await, vec![AYESHA, AYESHA]);
    assert!(client.timers().is_running(TimerKind::History));
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_history_poll() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.open_thread(SARAH);
    client.settle().await;
    client.close();
    client.settle().await;
    mock.clear_calls().await;

    advance(&mut client, Duration::from_secs(10)).await;
    assert!(history_calls(&mock).await.is_empty());
    assert!(!client.timers().is_running(TimerKind::History));
    assert!(mock.count_calls(|c| *c == Call::UnreadCount).await >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_badge_suppressed_while_open() {
    let (mock, mut client) = setup().await;
    mock.push_incoming(AYESHA, "are you free?").await;
    mock.push_incoming(SARAH, "ping").await;
    client.mount();
    client.settle().await;
    assert_eq!(client.widget().unread_badge(), 2);

    client.open();
    assert_eq!(client.widget().unread_badge(), 0);
    client.settle().await;
    mock.push_incoming(UserId(4), "while open").await;
    mock.clear_calls().await;

    advance(&mut client, Duration::from_secs(6)).await;
    assert_eq!(client.widget().unread_badge(), 0);
    assert_eq!(mock.count_calls(|c| *c == Call::UnreadCount).await, 0);

    client.close();
    client.settle().await;
    assert_eq!(client.widget().unread_badge(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_incoming_message_flashes_sender_row() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.settle().await;
    assert_eq!(names(&client)[0], "Sarah Johnson");

    mock.push_incoming(AYESHA, "are you free?").await;
    advance(&mut client, Duration::from_millis(3050)).await;
    assert_eq!(names(&client)[0], "Ayesha");
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: true }));

    advance(&mut client, Duration::from_secs(1)).await;
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: false }));
    advance(&mut client, Duration::from_secs(1)).await;
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: true }));

    // A second message restarts the flash; the old interval must not keep
    // toggling alongside the new one.
    mock.push_incoming(AYESHA, "hello?").await;
    advance(&mut client, Duration::from_secs(1)).await;
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: true }));
    assert_eq!(client.widget().directory().find(AYESHA).map(|u| u.unread_count), Some(2));
    advance(&mut client, Duration::from_secs(1)).await;
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: false }));
    advance(&mut client, Duration::from_secs(1)).await;
    assert_eq!(client.widget().flash(), Some(Flash { user: AYESHA, lit: true }));

    client.open_thread(AYESHA);
    assert_eq!(client.widget().flash(), None);
    assert!(!client.timers().is_running(TimerKind::Flash));
    assert!(!client.timers().is_running(TimerKind::Incoming));
}

#[tokio::test(start_paused = true)]
async fn test_search_without_matches_then_cleared() {
    let (_mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.search("ali");
    client.settle().await;
    assert_eq!(client.widget().search().dropdown(), Dropdown::NoMatches);

    client.search("");
    client.settle().await;
    assert_eq!(client.widget().search().dropdown(), Dropdown::Hidden);

    client.search("ay");
    client.settle().await;
    match client.widget().search().dropdown() {
        Dropdown::Rows(rows) => assert_eq!(rows[0].user.username, "Ayesha"),
        other => panic!("expected rows, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_blur_hides_dropdown_after_delay() {
    let (_mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.search("m");
    client.settle().await;
    client.dispatch(Msg::SearchBlurred);
    advance(&mut client, Duration::from_millis(100)).await;
    assert!(client.widget().search().is_visible());
    advance(&mut client, Duration::from_millis(200)).await;
    assert!(!client.widget().search().is_visible());
}

#[tokio::test(start_paused = true)]
async fn test_blank_send_is_a_noop() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.open_thread(SARAH);
    client.settle().await;
    mock.clear_calls().await;

    client.send("   ");
    client.settle().await;
    assert_eq!(mock.count_calls(|c| matches!(c, Call::SendMessage { .. })).await, 0);
    assert_eq!(client.widget().input(), "   ");
    assert!(!client.take_focus_request());
}

#[tokio::test(start_paused = true)]
async fn test_send_reloads_history_and_refocuses() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.open_thread(SARAH);
    client.settle().await;

    client.send("Section 4.2 looks fine.");
    client.settle().await;
    assert_eq!(
        mock.count_calls(|c| matches!(c, Call::SendMessage { to, .. } if *to == SARAH)).await,
        1
    );
    assert_eq!(client.widget().input(), "");
    assert!(client.take_focus_request());
    let lines = client.widget().thread_lines();
    let last = lines.last().expect("thread is empty");
    assert!(last.own);
    assert_eq!(last.text, "Section 4.2 looks fine.");
    assert_eq!(lines.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_history_poll_keeps_bottom_pinned() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.dispatch(Msg::ViewportResized(2));
    client.open_thread(SARAH);
    client.settle().await;
    assert_eq!(client.widget().thread().map(|t| t.scroll().offset()), Some(1));

    mock.push_incoming(SARAH, "one more thing").await;
    mock.push_incoming(SARAH, "and another").await;
    advance(&mut client, Duration::from_millis(2050)).await;
    let scroll = *client.widget().thread().expect("no thread").scroll();
    assert_eq!(scroll.content_height(), 5);
    assert_eq!(scroll.offset(), 3);
    assert!(scroll.is_pinned());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_runs_for_mount_lifetime() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.settle().await;
    assert_eq!(mock.count_calls(|c| *c == Call::UpdateActivity).await, 1);

    advance(&mut client, Duration::from_millis(30_050)).await;
    assert_eq!(mock.count_calls(|c| *c == Call::UpdateActivity).await, 2);

    client.open();
    advance(&mut client, Duration::from_secs(30)).await;
    assert_eq!(mock.count_calls(|c| *c == Call::UpdateActivity).await, 3);

    client.unmount();
    assert!(client.timers().running().is_empty());
    advance(&mut client, Duration::from_secs(60)).await;
    assert_eq!(mock.count_calls(|c| *c == Call::UpdateActivity).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_failures_surface_without_losing_state() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.settle().await;
    assert_eq!(names(&client).len(), 5);

    mock.set_failing(true).await;
    client.refresh_list();
    client.settle().await;
    assert_eq!(names(&client).len(), 5);
    assert_eq!(client.widget().last_error().map(|e| e.kind), Some(FetchKind::Directory));

    mock.set_failing(false).await;
    client.refresh_list();
    client.settle().await;
    assert_eq!(client.widget().last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_share_document_into_thread() {
    let (mock, mut client) = setup().await;
    client.mount();
    client.open();
    client.dispatch(Msg::OpenDocumentPicker);
    assert!(client.widget().notice().is_some());

    client.open_thread(SARAH);
    client.dispatch(Msg::OpenDocumentPicker);
    client.settle().await;
    let documents = client
        .widget()
        .picker()
        .and_then(|p| p.documents.clone())
        .expect("documents not loaded");
    assert_eq!(documents.len(), 2);

    client.dispatch(Msg::ShareDocument(documents[0].id));
    client.settle().await;
    let lines = client.widget().thread_lines();
    assert_eq!(
        lines.last().map(|l| l.text.as_str()),
        Some("[Shared Data Knowledge] Merger Agreement Draft")
    );
    assert_eq!(
        mock.count_calls(|c| *c == Call::ShareDocument { document_id: 11, to: SARAH }).await,
        1
    );
}
