//! Non-destructive cut editing over a single transcribed source file.
//!
//! The virtual timeline is the continuous axis the editor scrubs against;
//! each enabled segment maps a contiguous virtual range onto a contiguous
//! slice of the source media. Edits (split, delete, restore, reorder,
//! move-word) rearrange the mapping without touching the source.

pub mod error;
pub mod export;
pub mod history;
pub mod mapper;
pub mod timeline;
pub mod types;
