use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JobVariant;

/// Where a fetched record ended up after one pass.
///
/// Every record starts out fetched; the lookup then lands it in exactly one
/// of these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    /// Pickup time written back.
    PickedUp,
    /// Delivery delta written back.
    Delivered,
    /// Lookup succeeded but carried no relevant event.
    NoEvent,
    /// Tracking lookup failed; the record is retried on a later run.
    LookupFailed,
    /// The record lacks data the job needs.
    Invalid,
}

impl RecordState {
    pub fn is_update(&self) -> bool {
        matches!(self, RecordState::PickedUp | RecordState::Delivered)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordState::PickedUp => write!(f, "PICKED_UP"),
            RecordState::Delivered => write!(f, "DELIVERED"),
            RecordState::NoEvent => write!(f, "NO_EVENT"),
            RecordState::LookupFailed => write!(f, "LOOKUP_FAILED"),
            RecordState::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Structured record of one completed pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub variant: JobVariant,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Watermark after the pass.
    pub watermark: DateTime<Utc>,
    pub fetched: usize,
    pub no_event: usize,
    pub lookup_failed: usize,
    pub invalid: usize,
    pub updated_po_numbers: Vec<String>,
}

impl RunSummary {
    pub fn new(variant: JobVariant, started_at: DateTime<Utc>, watermark: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            variant,
            started_at,
            completed_at: None,
            watermark,
            fetched: 0,
            no_event: 0,
            lookup_failed: 0,
            invalid: 0,
            updated_po_numbers: Vec::new(),
        }
    }

    pub fn record(&mut self, po_number: Option<&str>, state: RecordState) {
        if state.is_update() {
            if let Some(po) = po_number {
                self.updated_po_numbers.push(po.to_string());
            }
            return;
        }
        match state {
            RecordState::NoEvent => self.no_event += 1,
            RecordState::LookupFailed => self.lookup_failed += 1,
            RecordState::Invalid => self.invalid += 1,
            RecordState::PickedUp | RecordState::Delivered => {}
        }
    }

    pub fn updated(&self) -> usize {
        self.updated_po_numbers.len()
    }
}
