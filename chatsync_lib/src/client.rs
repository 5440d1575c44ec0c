use crate::config::{ChatSyncConfig, RetryPolicy};
use crate::errors::Result;
use crate::service::{ChatBackend, MessageStore, UserDirectory};
use crate::timers::{Inbound, Timers};
use crate::types::UserId;
use crate::widget::{ChatWidget, Cmd, Msg, Reply};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Upper bound on scheduler rounds in [`ChatSyncClient::settle`].
const SETTLE_ROUNDS: usize = 64;

/// Run `op`, retrying transient failures with doubling backoff.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!("Attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Drives a [`ChatWidget`] against a live backend.
///
/// Commands returned by the widget are executed here: timers go to the
/// [`Timers`] scheduler and backend calls are spawned as tasks whose results
/// come back through the inbound channel as [`Msg`]s.
#[derive(Debug)]
pub struct ChatSyncClient {
    widget: ChatWidget,
    backend: Arc<dyn ChatBackend>,
    timers: Timers,
    tx: UnboundedSender<Inbound>,
    rx: UnboundedReceiver<Inbound>,
    retry: RetryPolicy,
    focus_requested: bool,
}

impl ChatSyncClient {
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Arc<dyn ChatBackend>, config: &ChatSyncConfig) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            widget: ChatWidget::new(config.current_user_id),
            backend,
            timers: Timers::new(tx.clone(), config.intervals.clone()),
            tx,
            rx,
            retry: config.retry,
            focus_requested: false,
        }
    }

    pub fn widget(&self) -> &ChatWidget {
        &self.widget
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Returns true once after the widget asked for the message input to
    /// regain focus.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let cmd = self.widget.update(msg);
        for cmd in cmd.into_vec() {
            self.perform(cmd);
        }
    }

    /// Apply everything already queued. Returns how many events were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(inbound) = self.rx.try_recv() {
            self.handle_inbound(inbound);
            handled += 1;
        }
        handled
    }

    /// Let spawned requests finish and apply their results, until nothing
    /// new arrives.
    pub async fn settle(&mut self) {
        for _ in 0..SETTLE_ROUNDS {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            if self.drain() == 0 {
                return;
            }
        }
    }

    /// Wait for the next event and apply it.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(inbound) => {
                self.handle_inbound(inbound);
                true
            }
            None => false,
        }
    }

    pub fn mount(&mut self) {
        self.dispatch(Msg::Mount);
    }

    pub fn unmount(&mut self) {
        self.dispatch(Msg::Unmount);
    }

    pub fn open(&mut self) {
        self.dispatch(Msg::Open);
    }

    pub fn close(&mut self) {
        self.dispatch(Msg::Close);
    }

    pub fn search(&mut self, query: impl Into<String>) {
        self.dispatch(Msg::SearchChanged(query.into()));
    }

    pub fn open_thread(&mut self, user: UserId) {
        self.dispatch(Msg::SelectUser(user));
    }

    pub fn send(&mut self, text: impl Into<String>) {
        self.dispatch(Msg::InputChanged(text.into()));
        self.dispatch(Msg::Send);
    }

    pub fn back_to_list(&mut self) {
        self.dispatch(Msg::BackToList);
    }

    pub fn refresh_list(&mut self) {
        self.dispatch(Msg::RefreshList);
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Msg(msg) => self.dispatch(msg),
            Inbound::Timer { kind, seq } => {
                if self.timers.accept(kind, seq) {
                    self.dispatch(Msg::Tick(kind));
                } else {
                    debug!("Discarding tick from replaced {:?} timer", kind);
                }
            }
        }
    }

    fn perform(&mut self, cmd: Cmd) {
        let retry = self.retry;
        match cmd {
            Cmd::None | Cmd::Batch(_) => {}
            Cmd::StartTimer(kind) => {
                if kind.is_repeating() {
                    self.timers.start(kind);
                } else {
                    self.timers.start_once(kind);
                }
            }
            Cmd::StopTimer(kind) => {
                self.timers.stop(kind);
            }
            Cmd::FocusInput => self.focus_requested = true,
            Cmd::SearchUsers { generation, query } => self.spawn_request(
                retry,
                move |backend| {
                    let query = query.clone();
                    async move { backend.search_users(&query).await }
                },
                move |result| Msg::UsersSearched { generation, result },
            ),
            Cmd::LoadAllUsers { generation } => self.spawn_request(
                retry,
                |backend| async move { backend.list_users().await },
                move |result| Msg::UsersListed { generation, result },
            ),
            Cmd::LoadHistory { generation, with } => self.spawn_request(
                retry,
                move |backend| async move { backend.fetch_history(with).await },
                move |result| Msg::HistoryLoaded { generation, with, result },
            ),
            Cmd::SendMessage { to, text } => {
                let sent = text.clone();
                self.spawn_request(
                    RetryPolicy::none(),
                    move |backend| {
                        let text = text.clone();
                        async move { backend.send_message(to, &text).await }
                    },
                    move |result| Msg::MessageSent { to, text: sent, result },
                )
            }
            Cmd::FetchUnread { generation } => self.spawn_request(
                retry,
                |backend| async move { backend.unread_count().await },
                move |result| Msg::UnreadCounted { generation, result },
            ),
            Cmd::MarkRead => self.spawn_request(
                retry,
                |backend| async move { backend.mark_read().await },
                Msg::MarkedRead,
            ),
            Cmd::FetchLatest { generation } => self.spawn_request(
                retry,
                |backend| async move { backend.latest_message().await },
                move |result| Msg::LatestFetched { generation, result },
            ),
            Cmd::PingActivity => self.spawn_request(
                RetryPolicy::none(),
                |backend| async move { backend.update_activity().await },
                Msg::ActivityPinged,
            ),
            Cmd::ListDocuments { generation } => self.spawn_request(
                retry,
                |backend| async move { backend.list_documents().await },
                move |result| Msg::DocumentsListed { generation, result },
            ),
            Cmd::ShareDocument { document_id, to } => self.spawn_request(
                RetryPolicy::none(),
                move |backend| async move { backend.share_document(document_id, to).await },
                move |result| Msg::DocumentShared { to, result },
            ),
        }
    }

    fn spawn_request<T, F, Fut, W>(&self, retry: RetryPolicy, call: F, wrap: W)
    where
        T: Send + 'static,
        F: Fn(Arc<dyn ChatBackend>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Reply<T>) -> Msg + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = with_retry(retry, move || call(Arc::clone(&backend)))
                .await
                .map_err(|e| e.to_string());
            // The client may be gone already; nothing left to update then.
            let _ = tx.send(Inbound::Msg(wrap(result)));
        });
    }
}
