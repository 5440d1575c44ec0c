use crate::types::{TimerKind, UserId};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Cadence of every timer the client runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PollIntervals {
    pub history: Duration,
    pub unread_badge: Duration,
    pub incoming: Duration,
    pub flash: Duration,
    pub heartbeat: Duration,
    pub search_hide: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            history: Duration::from_millis(2000),
            unread_badge: Duration::from_millis(3000),
            incoming: Duration::from_millis(3000),
            flash: Duration::from_millis(1000),
            heartbeat: Duration::from_millis(30_000),
            search_hide: Duration::from_millis(200),
        }
    }
}

impl PollIntervals {
    pub fn period(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::History => self.history,
            TimerKind::UnreadBadge => self.unread_badge,
            TimerKind::Incoming => self.incoming,
            TimerKind::Flash => self.flash,
            TimerKind::Heartbeat => self.heartbeat,
            TimerKind::SearchHide => self.search_hide,
        }
    }
}

/// Capped retry for requests that never reached the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before the given retry (1-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

#[derive(Debug, Clone)]
pub struct ChatSyncConfig {
    pub base_url: String,
    /// The local user, used to tell own messages from the other side's.
    pub current_user_id: Option<UserId>,
    /// Raw `Cookie` header value carrying the backend session.
    pub session_cookie: Option<String>,
    pub request_timeout: Duration,
    pub intervals: PollIntervals,
    pub retry: RetryPolicy,
}

impl Default for ChatSyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            current_user_id: None,
            session_cookie: None,
            request_timeout: Duration::from_secs(10),
            intervals: PollIntervals::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ChatSyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("CHATSYNC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let current_user_id = match env::var("CHATSYNC_USER_ID") {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(id) => Some(UserId(id)),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CHATSYNC_USER_ID: {}", raw);
                    None
                }
            },
            Err(_) => None,
        };

        let session_cookie = env::var("CHATSYNC_SESSION")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let intervals = PollIntervals {
            history: env_millis("CHATSYNC_HISTORY_POLL_MS", defaults.intervals.history),
            unread_badge: env_millis("CHATSYNC_UNREAD_POLL_MS", defaults.intervals.unread_badge),
            incoming: env_millis("CHATSYNC_INCOMING_POLL_MS", defaults.intervals.incoming),
            flash: env_millis("CHATSYNC_FLASH_MS", defaults.intervals.flash),
            heartbeat: env_millis("CHATSYNC_HEARTBEAT_MS", defaults.intervals.heartbeat),
            search_hide: env_millis("CHATSYNC_SEARCH_HIDE_MS", defaults.intervals.search_hide),
        };

        let retry = RetryPolicy {
            max_attempts: env::var("CHATSYNC_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.retry.max_attempts),
            initial_backoff: env_millis("CHATSYNC_RETRY_BACKOFF_MS", defaults.retry.initial_backoff),
        };

        Self {
            base_url,
            current_user_id,
            session_cookie,
            request_timeout: env_millis("CHATSYNC_TIMEOUT_MS", defaults.request_timeout),
            intervals,
            retry,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn current_user(mut self, id: impl Into<UserId>) -> Self {
        self.current_user_id = Some(id.into());
        self
    }

    pub fn session(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Load `.env` from the working directory, then the first `.env.local` found
/// walking up towards the filesystem root. Returns the `.env.local` used.
pub fn load_env_files() -> Option<PathBuf> {
    dotenv::dotenv().ok();

    let mut current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    loop {
        let env_file = current_dir.join(".env.local");
        if env_file.exists() {
            dotenv::from_path(&env_file).ok();
            return Some(env_file);
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return None,
        }
    }
}
