use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

/// Time in microseconds. Used for both the virtual timeline axis and real
/// source-media timestamps; integer arithmetic keeps the segment layout
/// invariants exact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0) as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn abs_diff(&self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// Word / ClipItem
// ---------------------------------------------------------------------------

/// One transcribed word with its span in the source media.
///
/// Words within a clip are time-ordered and non-overlapping; that is the
/// transcription provider's contract and is not re-validated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    pub id: Uuid,
    pub text: String,
    pub start: TimeUs,
    pub end: TimeUs,
}

/// Pre-edit unit produced by transcription: an ordered run of words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipItem {
    pub id: Uuid,
    pub words: Vec<Word>,
}

impl ClipItem {
    pub fn new(words: Vec<Word>) -> Self {
        Self {
            id: Uuid::new_v4(),
            words,
        }
    }
}

// ---------------------------------------------------------------------------
// VirtualSegment
// ---------------------------------------------------------------------------

/// One contiguous run of the virtual timeline mapped to one contiguous run
/// of source media. `[in_point, out_point)` is the source range played;
/// `start_time` is assigned by the manager's layout pass and is only
/// meaningful while the segment is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualSegment {
    pub id: Uuid,
    pub source_clip_id: Uuid,
    pub in_point: TimeUs,
    pub out_point: TimeUs,
    pub start_time: TimeUs,
    pub enabled: bool,
}

impl VirtualSegment {
    pub fn duration(&self) -> TimeUs {
        self.out_point - self.in_point
    }

    pub fn end_time(&self) -> TimeUs {
        self.start_time + self.duration()
    }

    /// Half-open: a virtual time exactly at `end_time` belongs to the next
    /// segment, not this one.
    pub fn contains_virtual(&self, t: TimeUs) -> bool {
        t >= self.start_time && t < self.end_time()
    }

    pub fn contains_real(&self, t: TimeUs) -> bool {
        t >= self.in_point && t < self.out_point
    }
}

// ---------------------------------------------------------------------------
// VirtualTimeline
// ---------------------------------------------------------------------------

/// Aggregate timeline state. `clip_order` keeps every segment id, disabled
/// ones included, so a restore lands back at its original position.
/// `duration` and `start_time`s are derived; `last_updated` is a monotonic
/// revision counter bumped on every mutation so consumers can detect
/// staleness without deep comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualTimeline {
    pub segments: Vec<VirtualSegment>,
    pub clip_order: Vec<Uuid>,
    pub duration: TimeUs,
    pub current_time: TimeUs,
    pub last_updated: u64,
}

impl VirtualTimeline {
    pub fn new() -> Self {
        Self {
            segments: vec![],
            clip_order: vec![],
            duration: TimeUs::ZERO,
            current_time: TimeUs::ZERO,
            last_updated: 0,
        }
    }

    pub fn segment(&self, id: Uuid) -> Option<&VirtualSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub(crate) fn segment_mut(&mut self, id: Uuid) -> Option<&mut VirtualSegment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }

    /// Enabled segments in playback (virtual) order.
    pub fn enabled_in_order(&self) -> impl Iterator<Item = &VirtualSegment> {
        self.clip_order
            .iter()
            .filter_map(|id| self.segment(*id))
            .filter(|s| s.enabled)
    }
}

impl Default for VirtualTimeline {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// TimeMapping
// ---------------------------------------------------------------------------

/// A resolved virtual↔real conversion. Lookups with no covering enabled
/// segment return `None` from the mapper instead of constructing this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeMapping {
    pub virtual_time: TimeUs,
    pub real_time: TimeUs,
    pub segment_id: Uuid,
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Playback synchronization tuning. Does not affect the data model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    pub frame_rate: f64,
    /// Maximum tolerated divergence between the media clock and the time
    /// implied by the virtual position before a corrective seek is issued.
    pub sync_threshold: TimeUs,
    pub buffer_size: usize,
    pub debug_mode: bool,
}

impl PlaybackConfig {
    /// One frame's duration at the given rate, the usual sync threshold.
    pub fn frame_duration(frame_rate: f64) -> TimeUs {
        TimeUs::from_seconds(1.0 / frame_rate.max(1.0))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            sync_threshold: TimeUs(33_333),
            buffer_size: 10,
            debug_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
