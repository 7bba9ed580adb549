use crate::error::{CoreError, Result};
use crate::timeline::VirtualTimelineManager;
use crate::types::{
    ClipItem, PlaybackConfig, TimeMapping, TimeUs, VirtualSegment, VirtualTimeline, Word,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Turns editor-level intents (split, delete, restore, reorder, move-word)
/// into segment-store mutations, and performs all virtual↔real time
/// conversion. The mapper owns the manager and the per-segment word lists;
/// nothing else mutates the store.
pub struct TimelineMapper {
    manager: VirtualTimelineManager,
    words: HashMap<Uuid, Vec<Word>>,
}

impl TimelineMapper {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            manager: VirtualTimelineManager::new(config),
            words: HashMap::new(),
        }
    }

    /// Build one enabled segment per clip, in input order. The played source
    /// range is derived from the clip's words (first word start to last word
    /// end), not the whole source file.
    pub fn initialize(&mut self, clips: Vec<ClipItem>) -> Result<()> {
        let mut segments = Vec::with_capacity(clips.len());
        let mut words = HashMap::new();

        for clip in clips {
            let (in_point, out_point) =
                word_bounds(&clip.words).ok_or(CoreError::EmptyClip(clip.id))?;
            let segment = VirtualSegment {
                id: Uuid::new_v4(),
                source_clip_id: clip.id,
                in_point,
                out_point,
                start_time: TimeUs::ZERO,
                enabled: true,
            };
            words.insert(segment.id, clip.words);
            segments.push(segment);
        }

        self.words = words;
        self.manager.initialize(segments);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cut edits
    // -----------------------------------------------------------------------

    /// Split a segment at a virtual time strictly inside it. The two halves
    /// share the original's `source_clip_id`, stay contiguous in clip order
    /// and preserve the total duration exactly. Word lists partition at the
    /// real split point: the first word ending past it starts the right
    /// half. Returns the two new ids for caller bookkeeping.
    pub fn split_clip(&mut self, segment_id: Uuid, split_virtual: TimeUs) -> Result<[Uuid; 2]> {
        let seg = self
            .manager
            .timeline()
            .segment(segment_id)
            .ok_or(CoreError::SegmentNotFound(segment_id))?
            .clone();

        let real_split = self
            .to_real(split_virtual)
            .filter(|m| m.segment_id == segment_id)
            .map(|m| m.real_time)
            .ok_or(CoreError::InvalidSplitPoint {
                segment_id,
                split_point: split_virtual,
            })?;
        // a boundary is not a split: to_real accepts start_time, exclude it
        if real_split <= seg.in_point || real_split >= seg.out_point {
            return Err(CoreError::InvalidSplitPoint {
                segment_id,
                split_point: split_virtual,
            });
        }

        let left = VirtualSegment {
            id: Uuid::new_v4(),
            source_clip_id: seg.source_clip_id,
            in_point: seg.in_point,
            out_point: real_split,
            start_time: seg.start_time,
            enabled: true,
        };
        let right = VirtualSegment {
            id: Uuid::new_v4(),
            source_clip_id: seg.source_clip_id,
            in_point: real_split,
            out_point: seg.out_point,
            start_time: split_virtual,
            enabled: true,
        };
        let result = [left.id, right.id];

        self.manager.apply_split(segment_id, split_virtual, left, right)?;

        let words = self.words.remove(&segment_id).unwrap_or_default();
        let cut = words
            .iter()
            .position(|w| w.end > real_split)
            .unwrap_or(words.len());
        let (first, second) = words.split_at(cut);
        self.words.insert(result[0], first.to_vec());
        self.words.insert(result[1], second.to_vec());

        Ok(result)
    }

    /// Soft delete. Deleting an already deleted segment is a no-op.
    pub fn delete_clip(&mut self, segment_id: Uuid) -> Result<()> {
        let seg = self
            .manager
            .timeline()
            .segment(segment_id)
            .ok_or(CoreError::SegmentNotFound(segment_id))?;
        if !seg.enabled {
            return Ok(());
        }
        self.manager.apply_delete(segment_id)
    }

    /// Inverse of delete: the segment re-enters the layout at its original
    /// clip-order position. Restoring an enabled segment is a no-op.
    pub fn restore_clip(&mut self, segment_id: Uuid) -> Result<()> {
        let seg = self
            .manager
            .timeline()
            .segment(segment_id)
            .ok_or(CoreError::SegmentNotFound(segment_id))?;
        if seg.enabled {
            return Ok(());
        }
        self.manager.apply_restore(segment_id)
    }

    /// Permute the arrangement. `new_order` must be a permutation of the
    /// full current clip order (disabled ids included).
    pub fn reorder_clips(&mut self, new_order: Vec<Uuid>) -> Result<()> {
        self.manager.apply_reorder(new_order)
    }

    /// Move one word from `source` to `target` at `position` (clamped to the
    /// target's word count). Both segments' played ranges are recomputed
    /// from their new first/last words; a source that empties is soft
    /// deleted rather than left zero-duration.
    pub fn move_word_between_clips(
        &mut self,
        word_id: Uuid,
        source: Uuid,
        target: Uuid,
        position: usize,
    ) -> Result<()> {
        if self.manager.timeline().segment(source).is_none() {
            return Err(CoreError::SegmentNotFound(source));
        }
        if self.manager.timeline().segment(target).is_none() {
            return Err(CoreError::SegmentNotFound(target));
        }

        let src_words = self
            .words
            .get_mut(&source)
            .ok_or(CoreError::SegmentNotFound(source))?;
        let word_idx = src_words
            .iter()
            .position(|w| w.id == word_id)
            .ok_or(CoreError::WordNotFound(word_id))?;
        let word = src_words.remove(word_idx);

        if source == target {
            let at = position.min(src_words.len());
            src_words.insert(at, word);
        } else {
            let tgt_words = self.words.entry(target).or_default();
            let at = position.min(tgt_words.len());
            tgt_words.insert(at, word);
        }

        let source_bounds = self.words.get(&source).and_then(|w| word_bounds(w));
        let target_bounds = self
            .words
            .get(&target)
            .and_then(|w| word_bounds(w))
            .ok_or_else(|| CoreError::InvalidOperation("target clip has no words".into()))?;

        self.manager
            .apply_word_move(word_id, source, target, source_bounds, target_bounds)
    }

    // -----------------------------------------------------------------------
    // Time conversion
    // -----------------------------------------------------------------------

    /// Virtual → real. `None` when no enabled segment covers the instant
    /// (e.g. past the edited duration); half-open, so a time exactly at a
    /// segment's end resolves to the next segment.
    pub fn to_real(&self, virtual_time: TimeUs) -> Option<TimeMapping> {
        self.manager
            .timeline()
            .enabled_in_order()
            .find(|s| s.contains_virtual(virtual_time))
            .map(|seg| TimeMapping {
                virtual_time,
                real_time: seg.in_point + (virtual_time - seg.start_time),
                segment_id: seg.id,
            })
    }

    /// Real → virtual, first match in virtual order. After a split the two
    /// halves can cover overlapping source ranges; callers tracking a
    /// specific segment should use [`to_virtual_in`](Self::to_virtual_in)
    /// instead of relying on a bare real time.
    pub fn to_virtual(&self, real_time: TimeUs) -> Option<TimeMapping> {
        self.manager
            .timeline()
            .enabled_in_order()
            .find(|s| s.contains_real(real_time))
            .map(|seg| mapping_in(seg, real_time))
    }

    /// Real → virtual inside one known segment: the context-hinted variant
    /// the player uses so an ambiguous real time cannot resolve to the
    /// wrong half of a split.
    pub fn to_virtual_in(&self, segment_id: Uuid, real_time: TimeUs) -> Option<TimeMapping> {
        self.manager
            .timeline()
            .segment(segment_id)
            .filter(|s| s.enabled && s.contains_real(real_time))
            .map(|seg| mapping_in(seg, real_time))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Enabled segment ids in playback order.
    pub fn current_clip_order(&self) -> Vec<Uuid> {
        self.manager
            .timeline()
            .enabled_in_order()
            .map(|s| s.id)
            .collect()
    }

    pub fn words(&self, segment_id: Uuid) -> Option<&[Word]> {
        self.words.get(&segment_id).map(Vec::as_slice)
    }

    pub fn manager(&self) -> &VirtualTimelineManager {
        &self.manager
    }

    pub fn timeline(&self) -> &VirtualTimeline {
        self.manager.timeline()
    }

    pub fn config(&self) -> &PlaybackConfig {
        self.manager.config()
    }

    pub fn update_config(&mut self, config: PlaybackConfig) {
        self.manager.update_config(config);
    }

    pub fn set_current_time(&mut self, virtual_time: TimeUs) {
        self.manager.set_current_time(virtual_time);
    }
}

fn mapping_in(seg: &VirtualSegment, real_time: TimeUs) -> TimeMapping {
    TimeMapping {
        virtual_time: seg.start_time + (real_time - seg.in_point),
        real_time,
        segment_id: seg.id,
    }
}

fn word_bounds(words: &[Word]) -> Option<(TimeUs, TimeUs)> {
    match (words.first(), words.last()) {
        (Some(first), Some(last)) => Some((first.start, last.end)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
