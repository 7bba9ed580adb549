use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no media element attached")]
    NotAttached,

    #[error("media transport rejected: {0}")]
    TransportRejected(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
