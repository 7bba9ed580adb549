use crate::error::{PlayerError, Result};
use crate::media::{FrameMetadata, MediaElement};
use scriptcut_core::mapper::TimelineMapper;
use scriptcut_core::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FrameEvent {
    pub virtual_time: TimeUs,
    pub real_time: TimeUs,
    pub metadata: FrameMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeekOutcome {
    pub virtual_time: TimeUs,
    pub real_time: TimeUs,
}

/// Returned by the `on_*` registrations; pass to
/// [`unsubscribe`](PlayerController::unsubscribe) to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Attached,
    Playing,
    Paused,
    Stopped,
}

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Listeners {
    frame: Vec<(u64, Box<dyn FnMut(&FrameEvent)>)>,
    play: Vec<(u64, Box<dyn FnMut()>)>,
    pause: Vec<(u64, Box<dyn FnMut()>)>,
    stop: Vec<(u64, Box<dyn FnMut()>)>,
    seek: Vec<(u64, Box<dyn FnMut(TimeUs)>)>,
    seeked: Vec<(u64, Box<dyn FnMut(&SeekOutcome)>)>,
    time_update: Vec<(u64, Box<dyn FnMut(TimeUs)>)>,
}

impl Listeners {
    fn notify_frame(&mut self, event: &FrameEvent) {
        for (_, f) in &mut self.frame {
            f(event);
        }
    }

    fn notify_play(&mut self) {
        for (_, f) in &mut self.play {
            f();
        }
    }

    fn notify_pause(&mut self) {
        for (_, f) in &mut self.pause {
            f();
        }
    }

    fn notify_stop(&mut self) {
        for (_, f) in &mut self.stop {
            f();
        }
    }

    fn notify_seek(&mut self, virtual_time: TimeUs) {
        for (_, f) in &mut self.seek {
            f(virtual_time);
        }
    }

    fn notify_seeked(&mut self, outcome: &SeekOutcome) {
        for (_, f) in &mut self.seeked {
            f(outcome);
        }
    }

    fn notify_time_update(&mut self, virtual_time: TimeUs) {
        for (_, f) in &mut self.time_update {
            f(virtual_time);
        }
    }

    fn remove(&mut self, id: u64) {
        self.frame.retain(|(i, _)| *i != id);
        self.play.retain(|(i, _)| *i != id);
        self.pause.retain(|(i, _)| *i != id);
        self.stop.retain(|(i, _)| *i != id);
        self.seek.retain(|(i, _)| *i != id);
        self.seeked.retain(|(i, _)| *i != id);
        self.time_update.retain(|(i, _)| *i != id);
    }

    fn clear(&mut self) {
        self.frame.clear();
        self.play.clear();
        self.pause.clear();
        self.stop.clear();
        self.seek.clear();
        self.seeked.clear();
        self.time_update.clear();
    }
}

// ---------------------------------------------------------------------------
// Frame resolution
// ---------------------------------------------------------------------------

/// What one frame tick decided to do, computed under the mapper lock and
/// acted on after it is released.
enum FrameAction {
    Emit {
        segment_id: Uuid,
        virtual_time: TimeUs,
        real_time: TimeUs,
    },
    CorrectDrift {
        expected_real: TimeUs,
        drift: TimeUs,
    },
    Advance {
        segment_id: Uuid,
        virtual_time: TimeUs,
        real_time: TimeUs,
    },
    EndOfTimeline {
        duration: TimeUs,
    },
}

// ---------------------------------------------------------------------------
// PlayerController
// ---------------------------------------------------------------------------

/// Binds one media element to the virtual timeline: converts virtual
/// transport commands into real playback commands, and real playback
/// position back into virtual-time events for observers.
///
/// `idle → attached → playing ⇄ paused → stopped`, with `seeking` as a
/// transient sub-state that suspends frame handling until the element
/// confirms the seek.
///
/// Edits apply to the shared mapper at any time, including mid-playback;
/// there is no lock barrier. Each frame tick reads the timeline fresh and
/// recovers from whatever the edit did to the playhead's segment.
pub struct PlayerController<M: MediaElement> {
    mapper: Arc<Mutex<TimelineMapper>>,
    media: Option<M>,
    state: PlayerState,
    seeking: bool,
    pending_seek: Option<SeekOutcome>,
    playback_rate: f64,
    current_segment: Option<Uuid>,
    frames_seen: u64,
    listeners: Listeners,
    next_listener: u64,
}

impl<M: MediaElement> PlayerController<M> {
    pub fn new(mapper: Arc<Mutex<TimelineMapper>>) -> Self {
        Self {
            mapper,
            media: None,
            state: PlayerState::Idle,
            seeking: false,
            pending_seek: None,
            playback_rate: 1.0,
            current_segment: None,
            frames_seen: 0,
            listeners: Listeners::default(),
            next_listener: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Attachment
    // -----------------------------------------------------------------------

    /// Bind the element. A previous binding is torn down first so two
    /// elements never drive the same timeline.
    pub fn attach_video(&mut self, mut media: M) {
        if self.media.is_some() {
            self.detach_video();
        }
        media.set_playback_rate(self.playback_rate);
        self.media = Some(media);
        self.state = PlayerState::Attached;
        self.frames_seen = 0;
        tracing::info!("media element attached");
    }

    /// Unbind and hand the element back to the caller.
    pub fn detach_video(&mut self) -> Option<M> {
        let media = self.media.take();
        if media.is_some() {
            self.state = PlayerState::Idle;
            self.seeking = false;
            self.pending_seek = None;
            self.current_segment = None;
            tracing::info!("media element detached");
        }
        media
    }

    /// Detach and drop every listener. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.detach_video();
        self.listeners.clear();
    }

    pub fn media(&self) -> Option<&M> {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> Option<&mut M> {
        self.media.as_mut()
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Start playback from the current virtual position. If that position is
    /// not covered by an enabled segment (the edit under the playhead
    /// deleted it, or playback ran off the end), playback starts from the
    /// first enabled segment instead. A transport rejection from the host
    /// (autoplay policy and the like) is propagated; retrying without a new
    /// user gesture cannot succeed, so the controller never retries.
    pub fn play(&mut self) -> Result<()> {
        if self.media.is_none() {
            return Err(PlayerError::NotAttached);
        }

        let (target, threshold) = {
            let mut mapper = self.mapper.lock().unwrap();
            let duration = mapper.timeline().duration;
            let threshold = mapper.config().sync_threshold;
            let vt = mapper
                .timeline()
                .current_time
                .clamp(TimeUs::ZERO, duration);
            let target = mapper
                .to_real(vt)
                .map(|m| (m.segment_id, m.virtual_time, m.real_time))
                .or_else(|| {
                    mapper
                        .timeline()
                        .enabled_in_order()
                        .next()
                        .map(|s| (s.id, s.start_time, s.in_point))
                });
            if let Some((_, virtual_time, _)) = target {
                mapper.set_current_time(virtual_time);
            }
            (target, threshold)
        };

        if let Some((segment_id, _, real_time)) = target {
            self.current_segment = Some(segment_id);
            if let Some(media) = self.media.as_mut() {
                if media.current_time().abs_diff(real_time) > threshold {
                    media.request_seek(real_time);
                    self.seeking = true;
                }
            }
        }

        match self.media.as_mut() {
            Some(media) => media.play()?,
            None => return Err(PlayerError::NotAttached),
        }
        self.state = PlayerState::Playing;
        self.listeners.notify_play();
        tracing::debug!("playback started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        let media = self.media.as_mut().ok_or(PlayerError::NotAttached)?;
        media.pause();
        self.state = PlayerState::Paused;
        self.listeners.notify_pause();
        tracing::debug!("playback paused");
        Ok(())
    }

    /// Pause and reset the virtual position to zero.
    pub fn stop(&mut self) -> Result<()> {
        let media = self.media.as_mut().ok_or(PlayerError::NotAttached)?;
        media.pause();
        self.mapper.lock().unwrap().set_current_time(TimeUs::ZERO);
        self.state = PlayerState::Stopped;
        self.current_segment = None;
        self.seeking = false;
        self.pending_seek = None;
        self.listeners.notify_stop();
        tracing::debug!("playback stopped");
        Ok(())
    }

    /// Seek to a virtual time. Targets outside the enabled coverage are
    /// clamped to the nearest valid boundary rather than rejected: scrubbing
    /// past the edited duration is normal use, not an error. Enters the
    /// `seeking` sub-state until the element confirms; the confirmed times
    /// are then delivered to `on_seeked` listeners.
    pub fn seek(&mut self, virtual_time: TimeUs) -> Result<SeekOutcome> {
        if self.media.is_none() {
            return Err(PlayerError::NotAttached);
        }

        let (segment_id, outcome) = {
            let mut mapper = self.mapper.lock().unwrap();
            let duration = mapper.timeline().duration;
            let clamped = virtual_time.clamp(TimeUs::ZERO, duration);
            let resolved = mapper
                .to_real(clamped)
                .map(|m| (m.segment_id, m.virtual_time, m.real_time))
                .or_else(|| nearest_valid_boundary(&mapper, clamped));
            match resolved {
                Some((segment_id, vt, rt)) => {
                    mapper.set_current_time(vt);
                    (
                        Some(segment_id),
                        SeekOutcome {
                            virtual_time: vt,
                            real_time: rt,
                        },
                    )
                }
                None => {
                    // nothing enabled at all; park at zero
                    mapper.set_current_time(TimeUs::ZERO);
                    (
                        None,
                        SeekOutcome {
                            virtual_time: TimeUs::ZERO,
                            real_time: TimeUs::ZERO,
                        },
                    )
                }
            }
        };

        self.current_segment = segment_id;
        if let Some(media) = self.media.as_mut() {
            media.request_seek(outcome.real_time);
        }
        self.seeking = true;
        self.pending_seek = Some(outcome);
        self.listeners.notify_seek(outcome.virtual_time);
        tracing::debug!(
            target_virtual = %outcome.virtual_time,
            target_real = %outcome.real_time,
            "seek commanded"
        );
        Ok(outcome)
    }

    /// Passthrough to the element. Time mapping is rate-independent, so no
    /// mapper state changes.
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
        if let Some(media) = self.media.as_mut() {
            media.set_playback_rate(rate);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn current_time(&self) -> TimeUs {
        self.mapper.lock().unwrap().timeline().current_time
    }

    pub fn duration(&self) -> TimeUs {
        self.mapper.lock().unwrap().timeline().duration
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    // -----------------------------------------------------------------------
    // Frame heartbeat
    // -----------------------------------------------------------------------

    /// Entry point for the host's per-rendered-frame callback (or the
    /// [`FrameTicker`](crate::clock::FrameTicker) substitute).
    ///
    /// Reads the element's real time, derives the virtual time through the
    /// segment the playhead is bound to, and notifies listeners. When the
    /// real clock has drifted from the position implied by the virtual time
    /// by more than the configured threshold — which is exactly what a
    /// structural edit under a playing video looks like — the element is
    /// re-seeked to the virtual position instead of trusting its clock.
    pub fn handle_frame(&mut self, metadata: FrameMetadata) {
        if self.media.is_none() {
            return;
        }

        // resolve an in-flight seek before anything else, so a seek issued
        // while paused still reports completion; the confirming frame is a
        // transition frame and carries no position update of its own
        if self.seeking {
            if self.media.as_ref().is_some_and(|m| m.is_seeking()) {
                return;
            }
            self.seeking = false;
            if let Some(outcome) = self.pending_seek.take() {
                self.listeners.notify_seeked(&outcome);
            }
            return;
        }

        if self.state != PlayerState::Playing {
            return;
        }

        let real = match self.media.as_ref() {
            Some(media) => media.current_time(),
            None => return,
        };

        // timeline is read fresh every frame: an edit may have landed since
        // the last tick and shifted the layout under us
        let (action, debug_mode) = {
            let mut mapper = self.mapper.lock().unwrap();
            let duration = mapper.timeline().duration;
            let threshold = mapper.config().sync_threshold;
            let debug_mode = mapper.config().debug_mode;
            let vt = mapper
                .timeline()
                .current_time
                .clamp(TimeUs::ZERO, duration);

            let action = match mapper
                .manager()
                .active_segment_at(vt)
                .map(|s| (s.id, s.start_time, s.in_point, s.out_point))
            {
                None => self.resolve_off_timeline(&mapper, vt, duration),
                Some((segment_id, start_time, in_point, out_point)) => {
                    let expected_real = in_point + (vt - start_time);
                    let drift = real.abs_diff(expected_real);
                    if drift > threshold {
                        FrameAction::CorrectDrift {
                            expected_real,
                            drift,
                        }
                    } else if real >= out_point {
                        // ran off the segment's source range: the contiguous
                        // layout puts the next segment exactly at this one's
                        // virtual end
                        let end = start_time + (out_point - in_point);
                        match mapper
                            .manager()
                            .active_segment_at(end)
                            .map(|s| (s.id, s.start_time, s.in_point))
                        {
                            Some((id, vstart, rin)) => FrameAction::Advance {
                                segment_id: id,
                                virtual_time: vstart,
                                real_time: rin,
                            },
                            None => FrameAction::EndOfTimeline { duration },
                        }
                    } else {
                        FrameAction::Emit {
                            segment_id,
                            virtual_time: (start_time + (real - in_point)).max(start_time),
                            real_time: real,
                        }
                    }
                }
            };

            match &action {
                FrameAction::Emit { virtual_time, .. }
                | FrameAction::Advance { virtual_time, .. } => {
                    mapper.set_current_time(*virtual_time)
                }
                FrameAction::EndOfTimeline { duration } => mapper.set_current_time(*duration),
                FrameAction::CorrectDrift { .. } => {}
            }
            (action, debug_mode)
        };

        match action {
            FrameAction::Emit {
                segment_id,
                virtual_time,
                real_time,
            } => {
                if self.current_segment != Some(segment_id) {
                    tracing::debug!(%segment_id, %virtual_time, "segment entered");
                    self.current_segment = Some(segment_id);
                }
                self.frames_seen += 1;
                if debug_mode && self.frames_seen % 30 == 0 {
                    tracing::debug!(
                        frames = self.frames_seen,
                        %virtual_time,
                        %real_time,
                        "frame sync status"
                    );
                }
                let event = FrameEvent {
                    virtual_time,
                    real_time,
                    metadata,
                };
                self.listeners.notify_frame(&event);
                self.listeners.notify_time_update(virtual_time);
            }
            FrameAction::CorrectDrift {
                expected_real,
                drift,
            } => {
                tracing::debug!(%drift, %expected_real, "drift beyond threshold, re-seeking");
                if let Some(media) = self.media.as_mut() {
                    media.request_seek(expected_real);
                }
                self.seeking = true;
            }
            FrameAction::Advance {
                segment_id,
                virtual_time,
                real_time,
            } => {
                tracing::debug!(%segment_id, %virtual_time, "advancing to next segment");
                self.current_segment = Some(segment_id);
                if let Some(media) = self.media.as_mut() {
                    media.request_seek(real_time);
                }
                self.seeking = true;
                self.listeners.notify_time_update(virtual_time);
            }
            FrameAction::EndOfTimeline { duration } => {
                tracing::debug!(%duration, "end of timeline reached");
                if let Some(media) = self.media.as_mut() {
                    media.pause();
                }
                self.state = PlayerState::Paused;
                self.current_segment = None;
                self.listeners.notify_time_update(duration);
                self.listeners.notify_pause();
            }
        }
    }

    /// The playhead's virtual position has no covering segment: either the
    /// segment under it was deleted mid-playback or the timeline shrank.
    /// Skip forward to the next enabled segment, or finish.
    fn resolve_off_timeline(
        &self,
        mapper: &TimelineMapper,
        vt: TimeUs,
        duration: TimeUs,
    ) -> FrameAction {
        match mapper
            .manager()
            .next_segment_after(vt)
            .map(|s| (s.id, s.start_time, s.in_point))
        {
            Some((segment_id, virtual_time, real_time)) => FrameAction::Advance {
                segment_id,
                virtual_time,
                real_time,
            },
            None => FrameAction::EndOfTimeline { duration },
        }
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    pub fn on_frame(&mut self, callback: impl FnMut(&FrameEvent) + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.frame.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_play(&mut self, callback: impl FnMut() + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.play.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_pause(&mut self, callback: impl FnMut() + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.pause.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_stop(&mut self, callback: impl FnMut() + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.stop.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_seek(&mut self, callback: impl FnMut(TimeUs) + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.seek.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_seeked(
        &mut self,
        callback: impl FnMut(&SeekOutcome) + 'static,
    ) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.seeked.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn on_time_update(&mut self, callback: impl FnMut(TimeUs) + 'static) -> ListenerHandle {
        let id = self.alloc_listener();
        self.listeners.time_update.push((id, Box::new(callback)));
        ListenerHandle(id)
    }

    pub fn unsubscribe(&mut self, handle: ListenerHandle) {
        self.listeners.remove(handle.0);
    }

    fn alloc_listener(&mut self) -> u64 {
        let id = self.next_listener;
        self.next_listener += 1;
        id
    }
}

/// Closest enabled segment boundary to a virtual time, as
/// `(segment, boundary virtual time, boundary real time)`. Used by `seek`
/// so that scrubbing outside the coverage lands on a playable edge.
fn nearest_valid_boundary(
    mapper: &TimelineMapper,
    virtual_time: TimeUs,
) -> Option<(Uuid, TimeUs, TimeUs)> {
    let mut best: Option<(TimeUs, (Uuid, TimeUs, TimeUs))> = None;
    for seg in mapper.timeline().enabled_in_order() {
        for (vt, rt) in [
            (seg.start_time, seg.in_point),
            (seg.end_time(), seg.out_point),
        ] {
            let distance = virtual_time.abs_diff(vt);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, (seg.id, vt, rt)));
            }
        }
    }
    best.map(|(_, hit)| hit)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scriptcut_core::types::{ClipItem, PlaybackConfig, Word};
    use std::cell::RefCell;
    use std::rc::Rc;

    // -----------------------------------------------------------------------
    // Fake media element
    // -----------------------------------------------------------------------

    /// Deterministic stand-in for the physical element. Seeks complete when
    /// the test calls `finish_seek`; the clock only moves when the test
    /// advances it.
    struct FakeMedia {
        time: TimeUs,
        seeking: bool,
        playing: bool,
        rate: f64,
        reject_play: bool,
        seek_targets: Vec<TimeUs>,
    }

    impl FakeMedia {
        fn new() -> Self {
            Self {
                time: TimeUs::ZERO,
                seeking: false,
                playing: false,
                rate: 1.0,
                reject_play: false,
                seek_targets: vec![],
            }
        }

        fn finish_seek(&mut self) {
            self.seeking = false;
        }

        fn advance(&mut self, by: TimeUs) {
            self.time = self.time + by;
        }
    }

    impl MediaElement for FakeMedia {
        fn current_time(&self) -> TimeUs {
            self.time
        }

        fn request_seek(&mut self, target: TimeUs) {
            self.time = target;
            self.seeking = true;
            self.seek_targets.push(target);
        }

        fn is_seeking(&self) -> bool {
            self.seeking
        }

        fn play(&mut self) -> Result<()> {
            if self.reject_play {
                return Err(PlayerError::TransportRejected(
                    "user gesture required".into(),
                ));
            }
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn set_playback_rate(&mut self, rate: f64) {
            self.rate = rate;
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    }

    fn make_word(start_s: f64, end_s: f64) -> Word {
        Word {
            id: Uuid::new_v4(),
            text: "w".to_string(),
            start: secs(start_s),
            end: secs(end_s),
        }
    }

    /// 2s + 3s + 4s clips over one 9s source file.
    fn make_mapper() -> (Arc<Mutex<TimelineMapper>>, Vec<Uuid>) {
        let clips = vec![
            ClipItem::new(vec![make_word(0.0, 2.0)]),
            ClipItem::new(vec![make_word(2.0, 5.0)]),
            ClipItem::new(vec![make_word(5.0, 9.0)]),
        ];
        let mut mapper = TimelineMapper::new(PlaybackConfig::default());
        mapper.initialize(clips).unwrap();
        let order = mapper.current_clip_order();
        (Arc::new(Mutex::new(mapper)), order)
    }

    fn attached_controller() -> (PlayerController<FakeMedia>, Vec<Uuid>) {
        let (mapper, order) = make_mapper();
        let mut controller = PlayerController::new(mapper);
        controller.attach_video(FakeMedia::new());
        (controller, order)
    }

    fn meta(frame: u64) -> FrameMetadata {
        FrameMetadata {
            media_time: TimeUs::ZERO,
            presented_frames: frame,
        }
    }

    // -----------------------------------------------------------------------
    // State machine / transport
    // -----------------------------------------------------------------------

    #[test]
    fn transport_without_media_is_rejected() {
        let (mapper, _) = make_mapper();
        let mut controller: PlayerController<FakeMedia> = PlayerController::new(mapper);

        assert_eq!(controller.state(), PlayerState::Idle);
        assert!(matches!(
            controller.play().unwrap_err(),
            PlayerError::NotAttached
        ));
        assert!(matches!(
            controller.seek(secs(1.0)).unwrap_err(),
            PlayerError::NotAttached
        ));
        assert!(matches!(
            controller.pause().unwrap_err(),
            PlayerError::NotAttached
        ));
    }

    #[test]
    fn play_pause_stop_walk_the_state_machine() {
        let (mut controller, _) = attached_controller();
        assert_eq!(controller.state(), PlayerState::Attached);

        controller.play().unwrap();
        assert_eq!(controller.state(), PlayerState::Playing);
        assert!(controller.media().unwrap().playing);

        controller.pause().unwrap();
        assert_eq!(controller.state(), PlayerState::Paused);
        assert!(!controller.media().unwrap().playing);

        controller.play().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), PlayerState::Stopped);
        assert_eq!(controller.current_time(), TimeUs::ZERO);
    }

    #[test]
    fn rejected_play_propagates_and_leaves_state() {
        let (mut controller, _) = attached_controller();
        controller.media_mut().unwrap().reject_play = true;

        let result = controller.play();
        assert!(matches!(
            result.unwrap_err(),
            PlayerError::TransportRejected(_)
        ));
        assert_ne!(controller.state(), PlayerState::Playing);
    }

    #[test]
    fn stop_notifies_and_resets_virtual_time() {
        let (mut controller, _) = attached_controller();
        let stops = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&stops);
        controller.on_stop(move || *counter.borrow_mut() += 1);

        controller.play().unwrap();
        controller.seek(secs(4.0)).unwrap();
        controller.stop().unwrap();

        assert_eq!(*stops.borrow(), 1);
        assert_eq!(controller.current_time(), TimeUs::ZERO);
    }

    #[test]
    fn playback_rate_is_passthrough() {
        let (mut controller, _) = attached_controller();
        controller.set_playback_rate(1.5);
        assert_eq!(controller.playback_rate(), 1.5);
        assert_eq!(controller.media().unwrap().rate, 1.5);

        // rate does not disturb the mapping
        controller.seek(secs(4.0)).unwrap();
        assert_eq!(controller.current_time(), secs(4.0));
    }

    // -----------------------------------------------------------------------
    // Seek
    // -----------------------------------------------------------------------

    #[test]
    fn seek_resolves_virtual_to_real() {
        let (mut controller, _) = attached_controller();
        let outcome = controller.seek(secs(4.5)).unwrap();
        assert_eq!(outcome.virtual_time, secs(4.5));
        assert_eq!(outcome.real_time, secs(4.5)); // identity before edits
        assert!(controller.is_seeking());
    }

    #[test]
    fn seek_past_duration_clamps_instead_of_failing() {
        let (mut controller, _) = attached_controller();
        let outcome = controller.seek(secs(100.0)).unwrap();
        assert!(outcome.virtual_time <= secs(9.0));
        assert_eq!(outcome.virtual_time, secs(9.0));
        assert_eq!(outcome.real_time, secs(9.0));

        let negative = controller.seek(secs(-3.0)).unwrap();
        assert_eq!(negative.virtual_time, TimeUs::ZERO);
    }

    #[test]
    fn seeked_fires_once_element_confirms() {
        let (mut controller, _) = attached_controller();
        let confirmed: Rc<RefCell<Vec<SeekOutcome>>> = Rc::new(RefCell::new(vec![]));
        let sink = Rc::clone(&confirmed);
        controller.on_seeked(move |o| sink.borrow_mut().push(*o));

        controller.seek(secs(3.0)).unwrap();
        // pipeline still busy: nothing yet
        controller.handle_frame(meta(0));
        assert!(confirmed.borrow().is_empty());

        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(1));
        assert_eq!(confirmed.borrow().len(), 1);
        assert_eq!(confirmed.borrow()[0].virtual_time, secs(3.0));
        assert!(!controller.is_seeking());
    }

    #[test]
    fn seek_into_deleted_range_snaps_to_nearest_boundary() {
        let (mut controller, order) = attached_controller();
        {
            let mapper = controller.mapper.clone();
            let mut mapper = mapper.lock().unwrap();
            mapper.delete_clip(order[2]).unwrap();
        }
        // timeline is now 5s; scrubbing to 30s lands on the last edge
        let outcome = controller.seek(secs(30.0)).unwrap();
        assert_eq!(outcome.virtual_time, secs(5.0));
        assert_eq!(outcome.real_time, secs(5.0));
    }

    // -----------------------------------------------------------------------
    // Frame synchronization
    // -----------------------------------------------------------------------

    #[test]
    fn frames_advance_virtual_time_from_the_element_clock() {
        let (mut controller, _) = attached_controller();
        let frames: Rc<RefCell<Vec<FrameEvent>>> = Rc::new(RefCell::new(vec![]));
        let sink = Rc::clone(&frames);
        controller.on_frame(move |e| sink.borrow_mut().push(*e));

        controller.play().unwrap();
        controller.media_mut().unwrap().advance(secs(0.02));
        controller.handle_frame(meta(0));
        controller.media_mut().unwrap().advance(secs(0.02));
        controller.handle_frame(meta(1));

        let seen = frames.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].virtual_time, secs(0.02));
        assert_eq!(seen[1].virtual_time, secs(0.04));
        assert_eq!(controller.current_time(), secs(0.04));
        assert_eq!(controller.frames_seen(), 2);
    }

    #[test]
    fn frames_are_suppressed_while_paused_or_seeking() {
        let (mut controller, _) = attached_controller();
        let frames = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&frames);
        controller.on_frame(move |_| *sink.borrow_mut() += 1);

        // paused: nothing
        controller.handle_frame(meta(0));
        assert_eq!(*frames.borrow(), 0);

        controller.play().unwrap();
        controller.seek(secs(1.0)).unwrap();
        // seeking and unconfirmed: still nothing
        controller.handle_frame(meta(1));
        assert_eq!(*frames.borrow(), 0);

        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(2)); // consumes the confirmation
        controller.handle_frame(meta(3));
        assert_eq!(*frames.borrow(), 1);
    }

    #[test]
    fn drift_beyond_threshold_triggers_corrective_seek() {
        let (mut controller, _) = attached_controller();
        controller.play().unwrap();
        controller.media_mut().unwrap().advance(secs(0.02));
        controller.handle_frame(meta(0));
        let virtual_before = controller.current_time();

        // the element clock jumps far from the virtual position
        controller.media_mut().unwrap().time = secs(7.0);
        controller.handle_frame(meta(1));

        let media = controller.media().unwrap();
        assert_eq!(*media.seek_targets.last().unwrap(), virtual_before);
        assert!(controller.is_seeking());
        // virtual position was trusted over the element clock
        assert_eq!(controller.current_time(), virtual_before);
    }

    #[test]
    fn small_drift_is_tolerated() {
        let (mut controller, _) = attached_controller();
        controller.play().unwrap();
        controller.media_mut().unwrap().advance(secs(0.01));
        controller.handle_frame(meta(0));
        assert!(!controller.is_seeking());
        assert_eq!(controller.current_time(), secs(0.01));
    }

    #[test]
    fn crossing_a_segment_boundary_advances_to_the_next() {
        let (mut controller, order) = attached_controller();
        controller.seek(secs(1.98)).unwrap();
        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(0));
        controller.play().unwrap();

        // element plays 30ms past the first segment's out point
        controller.media_mut().unwrap().time = secs(2.01);
        controller.handle_frame(meta(1));

        // identity layout: segment 2's source range starts at its virtual
        // start, so the controller lands exactly on the boundary
        assert_eq!(controller.current_time(), secs(2.0));
        assert_eq!(controller.current_segment, Some(order[1]));
        assert!(controller.is_seeking());
        assert_eq!(
            *controller.media().unwrap().seek_targets.last().unwrap(),
            secs(2.0)
        );
    }

    #[test]
    fn deleting_the_playing_segment_recovers_on_next_frame() {
        init_tracing();
        let (mut controller, order) = attached_controller();
        controller.seek(secs(1.0)).unwrap();
        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(0));
        controller.play().unwrap();

        // edit lands mid-playback, no barrier: first clip disappears
        {
            let mapper = controller.mapper.clone();
            mapper.lock().unwrap().delete_clip(order[0]).unwrap();
        }

        controller.handle_frame(meta(1));
        // virtual 1.0 now belongs to the former second clip (real 3.0);
        // the stale element clock (1.0) reads as drift and is corrected
        assert!(controller.is_seeking());
        assert_eq!(
            *controller.media().unwrap().seek_targets.last().unwrap(),
            secs(3.0)
        );

        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(2));
        controller.handle_frame(meta(3));
        assert_eq!(controller.current_segment, Some(order[1]));
    }

    #[test]
    fn reaching_the_end_pauses_with_virtual_time_parked_at_duration() {
        let (mut controller, _) = attached_controller();
        let pauses = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&pauses);
        controller.on_pause(move || *sink.borrow_mut() += 1);

        controller.seek(secs(8.98)).unwrap();
        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(0));
        controller.play().unwrap();

        // one more frame of decode runs past the final out point
        controller.media_mut().unwrap().time = secs(9.01);
        controller.handle_frame(meta(1));

        assert_eq!(controller.state(), PlayerState::Paused);
        assert_eq!(controller.current_time(), secs(9.0));
        assert!(!controller.media().unwrap().playing);
        assert_eq!(*pauses.borrow(), 1);
    }

    #[test]
    fn shrinking_the_timeline_under_a_parked_playhead_skips_to_the_end() {
        let (mut controller, order) = attached_controller();
        controller.seek(secs(8.0)).unwrap();
        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(0));
        controller.play().unwrap();

        {
            let mapper = controller.mapper.clone();
            mapper.lock().unwrap().delete_clip(order[2]).unwrap();
        }

        // playhead (8.0) is beyond the new 5s duration and nothing follows
        controller.handle_frame(meta(1));
        assert_eq!(controller.state(), PlayerState::Paused);
        assert_eq!(controller.current_time(), secs(5.0));
    }

    // -----------------------------------------------------------------------
    // Attachment / listeners
    // -----------------------------------------------------------------------

    #[test]
    fn reattach_tears_down_previous_element() {
        let (mut controller, _) = attached_controller();
        controller.play().unwrap();

        let mut second = FakeMedia::new();
        second.time = secs(4.0);
        controller.attach_video(second);

        assert_eq!(controller.state(), PlayerState::Attached);
        assert!(!controller.is_seeking());
        assert_eq!(controller.media().unwrap().time, secs(4.0));
    }

    #[test]
    fn detach_returns_the_element() {
        let (mut controller, _) = attached_controller();
        let media = controller.detach_video();
        assert!(media.is_some());
        assert_eq!(controller.state(), PlayerState::Idle);
        assert!(controller.detach_video().is_none());
    }

    #[test]
    fn unsubscribe_removes_a_single_listener() {
        let (mut controller, _) = attached_controller();
        let plays = Rc::new(RefCell::new(0));

        let first = Rc::clone(&plays);
        let handle = controller.on_play(move || *first.borrow_mut() += 1);
        let second = Rc::clone(&plays);
        controller.on_play(move || *second.borrow_mut() += 10);

        controller.play().unwrap();
        assert_eq!(*plays.borrow(), 11);

        controller.unsubscribe(handle);
        controller.pause().unwrap();
        controller.play().unwrap();
        assert_eq!(*plays.borrow(), 21);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (mut controller, _) = attached_controller();
        let plays = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&plays);
        controller.on_play(move || *sink.borrow_mut() += 1);

        controller.cleanup();
        controller.cleanup();
        assert_eq!(controller.state(), PlayerState::Idle);

        // listeners are gone; a fresh attach and play notifies nobody
        controller.attach_video(FakeMedia::new());
        controller.play().unwrap();
        assert_eq!(*plays.borrow(), 0);
    }

    #[test]
    fn play_recovers_when_playhead_position_was_edited_away() {
        let (mut controller, order) = attached_controller();
        controller.seek(secs(1.0)).unwrap();
        controller.media_mut().unwrap().finish_seek();
        controller.handle_frame(meta(0));

        // everything is deleted except the last clip
        {
            let mapper = controller.mapper.clone();
            let mut mapper = mapper.lock().unwrap();
            mapper.delete_clip(order[0]).unwrap();
            mapper.delete_clip(order[1]).unwrap();
        }

        controller.play().unwrap();
        // the playhead fell into the remaining clip's shifted range
        assert_eq!(controller.current_segment, Some(order[2]));
        assert_eq!(controller.current_time(), secs(1.0));
    }
}
