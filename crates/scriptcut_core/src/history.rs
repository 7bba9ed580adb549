use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of edit records retained before the oldest is evicted.
pub const DEFAULT_HISTORY_CAP: usize = 256;

// ---------------------------------------------------------------------------
// CutEditOperation
// ---------------------------------------------------------------------------

/// One structural edit, recorded after it has been applied. Records are
/// append-only and never mutated. `revision` is the timeline's monotonic
/// revision counter at the time the edit landed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CutEditOperation {
    Split {
        revision: u64,
        segment_id: Uuid,
        split_point: TimeUs,
        result_ids: [Uuid; 2],
    },
    Delete {
        revision: u64,
        segment_id: Uuid,
    },
    Restore {
        revision: u64,
        segment_id: Uuid,
    },
    Reorder {
        revision: u64,
        new_order: Vec<Uuid>,
    },
    MoveWord {
        revision: u64,
        word_id: Uuid,
        from_segment: Uuid,
        to_segment: Uuid,
    },
}

impl CutEditOperation {
    pub fn revision(&self) -> u64 {
        match self {
            CutEditOperation::Split { revision, .. } => *revision,
            CutEditOperation::Delete { revision, .. } => *revision,
            CutEditOperation::Restore { revision, .. } => *revision,
            CutEditOperation::Reorder { revision, .. } => *revision,
            CutEditOperation::MoveWord { revision, .. } => *revision,
        }
    }
}

// ---------------------------------------------------------------------------
// EditLog
// ---------------------------------------------------------------------------

/// Capped append-only record of applied edits, newest last. Retention is
/// bounded: once `max_entries` is reached the oldest record is dropped.
#[derive(Debug, Clone)]
pub struct EditLog {
    entries: Vec<CutEditOperation>,
    max_entries: usize,
}

impl EditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, op: CutEditOperation) {
        self.entries.push(op);
        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[CutEditOperation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EditLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
