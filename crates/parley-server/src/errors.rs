use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("listener error: {0}")]
    Listener(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
