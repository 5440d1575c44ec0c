use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatSyncTuiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

pub type Result<T> = std::result::Result<T, ChatSyncTuiError>;
