use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether a recorded scan filled a component slot or a sensor slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    Component,
    Sensor,
}

/// Back-reference from a recorded scan to the slot it satisfied: the
/// component's sequence index, or the index of the sensor verification group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "ref", content = "value")]
pub enum SlotRef {
    ComponentSequence(u16),
    SensorGroup(u16),
}

/// One accepted scan, positioned 1-based across the whole sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedItem {
    pub position: u16,
    pub kind: ScanKind,
    pub item_code: String,
    pub barcode: String,
    pub scanned_at: DateTime<Utc>,
    pub slot_ref: SlotRef,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Reset,
}

/// Live, mutable state of one in-progress assembly's scanning workflow.
///
/// Owned and passed explicitly by the caller; mutated only by the sequencer
/// on accepted scans and by restart. Invariants held throughout:
/// `scanned_barcodes.len() == scanned_items.len()` and, while scannable,
/// `current_position == scanned_items.len() + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub assembly_id: String,
    pub work_order_id: String,
    pub assembly_type_id: String,
    pub current_position: u16,
    pub scanned_items: Vec<ScannedItem>,
    pub scanned_barcodes: HashSet<String>,
    pub status: SessionStatus,
}

impl ScanSession {
    pub fn new(
        assembly_id: impl Into<String>,
        work_order_id: impl Into<String>,
        assembly_type_id: impl Into<String>,
    ) -> Self {
        Self {
            assembly_id: assembly_id.into(),
            work_order_id: work_order_id.into(),
            assembly_type_id: assembly_type_id.into(),
            current_position: 1,
            scanned_items: Vec::new(),
            scanned_barcodes: HashSet::new(),
            status: SessionStatus::InProgress,
        }
    }

    /// Rebuilds a session from a persisted snapshot, deriving the barcode
    /// set from the item list so the two can never disagree.
    pub fn from_parts(
        assembly_id: impl Into<String>,
        work_order_id: impl Into<String>,
        assembly_type_id: impl Into<String>,
        scanned_items: Vec<ScannedItem>,
        status: SessionStatus,
    ) -> Self {
        let scanned_barcodes = scanned_items
            .iter()
            .map(|item| item.barcode.clone())
            .collect();
        let current_position = scanned_items.len() as u16 + 1;
        Self {
            assembly_id: assembly_id.into(),
            work_order_id: work_order_id.into(),
            assembly_type_id: assembly_type_id.into(),
            current_position,
            scanned_items,
            scanned_barcodes,
            status,
        }
    }

    /// Clears scan state back to position 1. Identifiers are untouched.
    pub fn reset(&mut self) {
        self.current_position = 1;
        self.scanned_items.clear();
        self.scanned_barcodes.clear();
        self.status = SessionStatus::Reset;
    }

    /// A session accepts scans while in progress or freshly reset.
    pub fn is_scannable(&self) -> bool {
        matches!(self.status, SessionStatus::InProgress | SessionStatus::Reset)
    }

    pub fn component_scan_count(&self) -> usize {
        self.scanned_items
            .iter()
            .filter(|i| i.kind == ScanKind::Component)
            .count()
    }

    pub fn sensor_scan_count(&self) -> usize {
        self.scanned_items
            .iter()
            .filter(|i| i.kind == ScanKind::Sensor)
            .count()
    }
}
