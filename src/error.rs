use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

pub type Result<T> = std::result::Result<T, CollabError>;
