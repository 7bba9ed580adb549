use crate::error::{CoreError, Result};
use crate::history::{CutEditOperation, EditLog};
use crate::types::{PlaybackConfig, TimeUs, VirtualSegment, VirtualTimeline};
use uuid::Uuid;

/// Single source of truth for the virtual timeline. Every structural
/// mutation goes through one of the `apply_*` methods so that layout,
/// duration, the revision counter and the edit log stay consistent.
///
/// Unknown ids are rejected before any state is touched; a failed operation
/// leaves the store exactly as it was.
pub struct VirtualTimelineManager {
    timeline: VirtualTimeline,
    config: PlaybackConfig,
    history: EditLog,
}

impl VirtualTimelineManager {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            timeline: VirtualTimeline::new(),
            config,
            history: EditLog::default(),
        }
    }

    /// Replace the whole segment set, clip order following input order.
    /// Starts a fresh edit session: the log is cleared and the playback
    /// position reset.
    pub fn initialize(&mut self, segments: Vec<VirtualSegment>) {
        self.timeline.clip_order = segments.iter().map(|s| s.id).collect();
        self.timeline.segments = segments;
        self.timeline.current_time = TimeUs::ZERO;
        self.history.clear();
        self.recompute();
        self.touch();
        tracing::info!(
            segments = self.timeline.segments.len(),
            duration = %self.timeline.duration,
            "timeline initialized"
        );
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn timeline(&self) -> &VirtualTimeline {
        &self.timeline
    }

    pub fn snapshot(&self) -> VirtualTimeline {
        self.timeline.clone()
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Adjust playback-synchronization tuning. No effect on the data model.
    pub fn update_config(&mut self, config: PlaybackConfig) {
        tracing::debug!(?config, "playback config updated");
        self.config = config;
    }

    pub fn edit_history(&self) -> &[CutEditOperation] {
        self.history.entries()
    }

    /// Enabled segments whose virtual range contains the instant. At most
    /// one by the no-overlap invariant; a linear scan is fine at the scale
    /// of dozens to low hundreds of segments, and the contract allows an
    /// interval index later.
    pub fn active_segments(&self, virtual_time: TimeUs) -> Vec<&VirtualSegment> {
        self.timeline
            .segments
            .iter()
            .filter(|s| s.enabled && s.contains_virtual(virtual_time))
            .collect()
    }

    pub fn active_segment_at(&self, virtual_time: TimeUs) -> Option<&VirtualSegment> {
        self.timeline
            .segments
            .iter()
            .find(|s| s.enabled && s.contains_virtual(virtual_time))
    }

    /// First enabled segment starting strictly after the instant.
    pub fn next_segment_after(&self, virtual_time: TimeUs) -> Option<&VirtualSegment> {
        self.timeline
            .enabled_in_order()
            .find(|s| s.start_time > virtual_time)
    }

    /// Playback position bookkeeping; bumps the revision but records no edit.
    pub fn set_current_time(&mut self, virtual_time: TimeUs) {
        self.timeline.current_time = virtual_time;
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Mutations (called by the mapper)
    // -----------------------------------------------------------------------

    /// Replace one segment with its two halves, contiguous in clip order.
    pub fn apply_split(
        &mut self,
        target: Uuid,
        split_point: TimeUs,
        left: VirtualSegment,
        right: VirtualSegment,
    ) -> Result<()> {
        let seg_idx = self
            .timeline
            .segments
            .iter()
            .position(|s| s.id == target)
            .ok_or(CoreError::SegmentNotFound(target))?;
        let order_idx = self
            .timeline
            .clip_order
            .iter()
            .position(|id| *id == target)
            .ok_or(CoreError::SegmentNotFound(target))?;

        let result_ids = [left.id, right.id];
        self.timeline.segments[seg_idx] = left;
        self.timeline.segments.insert(seg_idx + 1, right);
        self.timeline.clip_order[order_idx] = result_ids[0];
        self.timeline.clip_order.insert(order_idx + 1, result_ids[1]);

        self.recompute();
        self.touch();
        self.record(CutEditOperation::Split {
            revision: self.timeline.last_updated,
            segment_id: target,
            split_point,
            result_ids,
        });
        tracing::debug!(%target, %split_point, "segment split");
        Ok(())
    }

    /// Soft delete: the segment stays in `segments` and `clip_order` but is
    /// skipped by the layout pass.
    pub fn apply_delete(&mut self, id: Uuid) -> Result<()> {
        let seg = self
            .timeline
            .segment_mut(id)
            .ok_or(CoreError::SegmentNotFound(id))?;
        seg.enabled = false;
        self.recompute();
        self.touch();
        self.record(CutEditOperation::Delete {
            revision: self.timeline.last_updated,
            segment_id: id,
        });
        tracing::debug!(%id, "segment deleted");
        Ok(())
    }

    /// Pure inverse of delete: the segment re-occupies its original clip
    /// order position.
    pub fn apply_restore(&mut self, id: Uuid) -> Result<()> {
        let seg = self
            .timeline
            .segment_mut(id)
            .ok_or(CoreError::SegmentNotFound(id))?;
        seg.enabled = true;
        self.recompute();
        self.touch();
        self.record(CutEditOperation::Restore {
            revision: self.timeline.last_updated,
            segment_id: id,
        });
        tracing::debug!(%id, "segment restored");
        Ok(())
    }

    /// Permute the full clip order (enabled and disabled ids). The new order
    /// must carry exactly the current id multiset; anything partial or
    /// foreign is rejected with the store untouched.
    pub fn apply_reorder(&mut self, new_order: Vec<Uuid>) -> Result<()> {
        if !is_permutation(&self.timeline.clip_order, &new_order) {
            return Err(CoreError::InvalidReorder);
        }
        self.timeline.clip_order = new_order.clone();
        self.recompute();
        self.touch();
        self.record(CutEditOperation::Reorder {
            revision: self.timeline.last_updated,
            new_order,
        });
        tracing::debug!("clip order changed");
        Ok(())
    }

    /// Apply the segment-boundary consequences of moving one word. The
    /// mapper has already moved the word and derived the new bounds;
    /// `source_bounds` of `None` means the source clip emptied and is soft
    /// deleted rather than left zero-duration.
    pub fn apply_word_move(
        &mut self,
        word_id: Uuid,
        source: Uuid,
        target: Uuid,
        source_bounds: Option<(TimeUs, TimeUs)>,
        target_bounds: (TimeUs, TimeUs),
    ) -> Result<()> {
        let src_idx = self
            .timeline
            .segments
            .iter()
            .position(|s| s.id == source)
            .ok_or(CoreError::SegmentNotFound(source))?;
        let tgt_idx = self
            .timeline
            .segments
            .iter()
            .position(|s| s.id == target)
            .ok_or(CoreError::SegmentNotFound(target))?;

        match source_bounds {
            Some((in_point, out_point)) => {
                self.timeline.segments[src_idx].in_point = in_point;
                self.timeline.segments[src_idx].out_point = out_point;
            }
            None => self.timeline.segments[src_idx].enabled = false,
        }
        self.timeline.segments[tgt_idx].in_point = target_bounds.0;
        self.timeline.segments[tgt_idx].out_point = target_bounds.1;

        self.recompute();
        self.touch();
        self.record(CutEditOperation::MoveWord {
            revision: self.timeline.last_updated,
            word_id,
            from_segment: source,
            to_segment: target,
        });
        tracing::debug!(%word_id, %source, %target, "word moved");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Walk the clip order, skip disabled entries, assign sequential start
    /// times and sum the duration. O(segments) with the id lookup folded in.
    fn recompute(&mut self) {
        let mut cursor = TimeUs::ZERO;
        let order = self.timeline.clip_order.clone();
        for id in order {
            if let Some(seg) = self.timeline.segment_mut(id) {
                if seg.enabled {
                    seg.start_time = cursor;
                    cursor = cursor + seg.duration();
                }
            }
        }
        self.timeline.duration = cursor;
    }

    fn touch(&mut self) {
        self.timeline.last_updated += 1;
    }

    fn record(&mut self, op: CutEditOperation) {
        self.history.push(op);
    }
}

fn is_permutation(current: &[Uuid], proposed: &[Uuid]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut a = current.to_vec();
    let mut b = proposed.to_vec();
    a.sort();
    b.sort();
    a == b
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
