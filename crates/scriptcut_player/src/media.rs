use crate::error::Result;
use scriptcut_core::types::TimeUs;
use serde::{Deserialize, Serialize};

/// The one physical playback resource this crate drives. In a browser-like
/// host this wraps the real video element; elsewhere any decoder that can
/// report a clock, accept seeks and start/stop playback qualifies.
///
/// Seeks are asynchronous with respect to the media pipeline: `request_seek`
/// only commands the target, and `is_seeking` stays true until the pipeline
/// confirms. The controller suspends frame handling in between.
pub trait MediaElement {
    /// Current playback position on the source media's own clock.
    fn current_time(&self) -> TimeUs;

    /// Command a seek; completion is observed via [`is_seeking`](Self::is_seeking).
    fn request_seek(&mut self, target: TimeUs);

    fn is_seeking(&self) -> bool;

    /// Start playback. May be rejected by the host (e.g. an autoplay policy
    /// requiring a user gesture); the rejection is propagated, never retried
    /// automatically.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn set_playback_rate(&mut self, rate: f64);
}

/// Per-rendered-frame information supplied by the host's frame callback
/// (or synthesized by a fixed-rate ticker where no such callback exists).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FrameMetadata {
    /// Media time of the presented frame as reported by the host.
    pub media_time: TimeUs,
    /// Count of frames presented so far.
    pub presented_frames: u64,
}
