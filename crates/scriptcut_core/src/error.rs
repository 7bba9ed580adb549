use crate::types::TimeUs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("segment not found: {0}")]
    SegmentNotFound(uuid::Uuid),

    #[error("word not found: {0}")]
    WordNotFound(uuid::Uuid),

    #[error("clip has no words: {0}")]
    EmptyClip(uuid::Uuid),

    #[error("split point {split_point} is not strictly inside segment {segment_id}")]
    InvalidSplitPoint {
        segment_id: uuid::Uuid,
        split_point: TimeUs,
    },

    #[error("new order is not a permutation of the current clip order")]
    InvalidReorder,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
