use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scan_session::ScannedItem;

/// Immutable, finalized summary of a fully scanned assembly. Created once by
/// the finalizer and never mutated afterwards; rework appends alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub assembly_id: String,
    pub work_order_id: String,
    /// 11-character traceability barcode, pattern `\d{4}24\d{5}`.
    pub assembly_barcode: String,
    /// Ordered snapshot of all scans, deduplicated by barcode.
    pub items: Vec<ScannedItem>,
    pub completed_at: DateTime<Utc>,
    pub operator: String,
}

/// One rework cycle opened against a completed assembly. Carries the
/// original traceability identifiers so downstream reporting still links the
/// rework to its origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReworkEntry {
    pub original_assembly_id: String,
    pub rework_id: Uuid,
    /// The original assembly's traceability barcode, preserved verbatim.
    pub assembly_barcode: String,
    /// Item codes of the original record's parts.
    pub item_codes: Vec<String>,
    pub reason: String,
    /// Monotonically incremented per rework cycle, starting at 1.
    pub rework_count: u32,
    pub created_at: DateTime<Utc>,
}
