pub mod types;
pub mod errors;
pub mod config;
pub mod service;
pub mod http_service;
pub mod mock_service;
pub mod timers;
pub mod widget;
pub mod client;

// Re-export commonly used types
pub use types::*;
pub use errors::*;
pub use config::{load_env_files, ChatSyncConfig, PollIntervals, RetryPolicy};
pub use service::{ChatBackend, MessageStore, UserDirectory};
pub use http_service::HttpChatService;
pub use mock_service::{Call, MockChatService};
pub use timers::Timers;
pub use widget::{ChatWidget, Cmd, Msg};
pub use client::{with_retry, ChatSyncClient};

use std::sync::Arc;

/// Backend selected by configuration: the REST service, or the in-memory
/// demo data set when `demo` is set.
pub async fn connect(config: &ChatSyncConfig, demo: bool) -> Result<Arc<dyn ChatBackend>> {
    if demo {
        tracing::info!("Using in-memory demo backend");
        return Ok(Arc::new(MockChatService::new_with_data().await));
    }
    tracing::info!("Using chat backend at {}", config.base_url);
    Ok(Arc::new(HttpChatService::new(config)?))
}
