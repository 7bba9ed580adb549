use crate::history::CutEditOperation;
use crate::mapper::TimelineMapper;
use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TIMELINE_DOCUMENT_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// ExportSegment
// ---------------------------------------------------------------------------

/// One flattened range for the downstream renderer: where the segment sits
/// on the edited timeline and which slice of the single source file it
/// plays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSegment {
    pub id: Uuid,
    pub start_time: TimeUs,
    pub end_time: TimeUs,
    pub source_clip_id: Uuid,
    pub source_start_time: TimeUs,
    pub source_end_time: TimeUs,
}

// ---------------------------------------------------------------------------
// TimelineDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportMetadata {
    pub duration: TimeUs,
    pub frame_rate: f64,
    pub total_segments: usize,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSource {
    /// Extent of source media referenced by any segment, deleted ones
    /// included.
    pub original_duration: TimeUs,
}

/// Self-contained description of the edited arrangement, handed to a
/// renderer that re-stitches the output from the original source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineDocument {
    pub version: String,
    pub metadata: ExportMetadata,
    pub source: ExportSource,
    pub segments: Vec<ExportSegment>,
    pub cut_edits: Vec<CutEditOperation>,
}

impl TimelineMapper {
    /// Flatten the enabled segments, in virtual order, into renderer ranges.
    pub fn generate_export_segments(&self) -> Vec<ExportSegment> {
        self.timeline()
            .enabled_in_order()
            .map(|seg| ExportSegment {
                id: seg.id,
                start_time: seg.start_time,
                end_time: seg.end_time(),
                source_clip_id: seg.source_clip_id,
                source_start_time: seg.in_point,
                source_end_time: seg.out_point,
            })
            .collect()
    }

    pub fn export_document(&self) -> TimelineDocument {
        let timeline = self.timeline();
        let segments = self.generate_export_segments();
        let original_duration = timeline
            .segments
            .iter()
            .map(|s| s.out_point)
            .max()
            .unwrap_or(TimeUs::ZERO);

        TimelineDocument {
            version: TIMELINE_DOCUMENT_VERSION.to_string(),
            metadata: ExportMetadata {
                duration: timeline.duration,
                frame_rate: self.config().frame_rate,
                total_segments: segments.len(),
                revision: timeline.last_updated,
            },
            source: ExportSource { original_duration },
            segments,
            cut_edits: self.manager().edit_history().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
