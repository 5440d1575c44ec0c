use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatSyncError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatSyncError {
    /// Failures where the request never produced a response. Only these are
    /// worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ChatSyncError::Http(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_rejections_are_not_transient() {
        let status = ChatSyncError::Status { status: 503, body: "busy".into() };
        assert!(!status.is_transient());
        assert!(!ChatSyncError::Rejected("nope".into()).is_transient());
        assert_eq!(status.to_string(), "Unexpected status 503: busy");
    }
}
