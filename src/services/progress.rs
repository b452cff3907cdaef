use serde::{Deserialize, Serialize};

use crate::models::{AssemblyTypeConfig, ScanSession, COMPONENT_COUNT};

/// Progress view handed to the operator UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub scanned_count: usize,
    pub total_count: usize,
}

/// Completion percentage, rounded to the nearest whole point.
pub fn percent_complete(session: &ScanSession, config: &AssemblyTypeConfig) -> u8 {
    let total = config.total_expected() as f64;
    let scanned = session.scanned_items.len() as f64;
    (scanned * 100.0 / total).round() as u8
}

pub fn snapshot(session: &ScanSession, config: &AssemblyTypeConfig) -> ProgressSnapshot {
    ProgressSnapshot {
        percent: percent_complete(session, config),
        scanned_count: session.scanned_items.len(),
        total_count: config.total_expected() as usize,
    }
}

/// Strict completion predicate: three independent counts must all hold, so
/// no single miscount can declare an assembly finished. The sequencer
/// reaching its terminal state is deliberately not trusted on its own.
pub fn is_fully_complete(session: &ScanSession, config: &AssemblyTypeConfig) -> bool {
    let components_done = session.component_scan_count() == COMPONENT_COUNT as usize;
    let sensors_done = session.sensor_scan_count() == config.sensor_count as usize;
    let total_done = session.scanned_items.len() == config.total_expected() as usize;
    components_done && sensors_done && total_done
}
