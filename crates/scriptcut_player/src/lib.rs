//! Playback over the virtual timeline: one media element, driven per
//! rendered frame, kept in sync with the edited arrangement.

pub mod clock;
pub mod controller;
pub mod error;
pub mod media;
