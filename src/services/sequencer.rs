use chrono::{DateTime, Utc};

use crate::errors::ServiceError;
use crate::models::{
    AssemblyTypeConfig, ScanKind, ScanSession, ScannedItem, SlotRef, COMPONENT_COUNT,
};
use crate::services::verifier;

/// Position of the sequencer's state machine: six component slots in fixed
/// order, then the variant's sensor slots by numeric position, then done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    AwaitingComponent(u16),
    AwaitingSensor(u16),
    Complete,
}

/// What the operator should scan next.
#[derive(Debug, Clone)]
pub struct ExpectedSlot {
    pub position: u16,
    pub kind: ScanKind,
    pub item_code: String,
    pub verification_code: Option<String>,
    pub slot_ref: SlotRef,
    pub label: String,
}

/// Derives the machine state from the session's current position.
pub fn state_of(session: &ScanSession, config: &AssemblyTypeConfig) -> SequencerState {
    let position = session.current_position;
    if position <= COMPONENT_COUNT {
        SequencerState::AwaitingComponent(position)
    } else if position <= config.total_expected() {
        SequencerState::AwaitingSensor(position - COMPONENT_COUNT)
    } else {
        SequencerState::Complete
    }
}

/// Resolves the slot expected at the session's current position, or `None`
/// once every slot is filled.
pub fn expected_slot(
    session: &ScanSession,
    config: &AssemblyTypeConfig,
) -> Result<Option<ExpectedSlot>, ServiceError> {
    match state_of(session, config) {
        SequencerState::Complete => Ok(None),
        SequencerState::AwaitingComponent(sequence_index) => {
            let spec = config.component_at(sequence_index).ok_or_else(|| {
                ServiceError::Configuration(format!(
                    "assembly type {} has no component at sequence {}",
                    config.id, sequence_index
                ))
            })?;
            Ok(Some(ExpectedSlot {
                position: session.current_position,
                kind: ScanKind::Component,
                item_code: spec.item_code.clone(),
                verification_code: spec.verification_code.clone(),
                slot_ref: SlotRef::ComponentSequence(sequence_index),
                label: format!(
                    "Component {} of {}: {}",
                    sequence_index, COMPONENT_COUNT, spec.name
                ),
            }))
        }
        SequencerState::AwaitingSensor(sensor_position) => {
            let group_index = config
                .sensor_groups
                .iter()
                .position(|g| g.positions.contains(&sensor_position))
                .ok_or_else(|| {
                    ServiceError::Configuration(format!(
                        "assembly type {} has no verification group for sensor {}",
                        config.id, sensor_position
                    ))
                })?;
            let item_code = config
                .sensor_item_code(sensor_position)
                .unwrap_or_default()
                .to_string();
            Ok(Some(ExpectedSlot {
                position: session.current_position,
                kind: ScanKind::Sensor,
                item_code,
                verification_code: config.sensor_groups[group_index].code.clone(),
                slot_ref: SlotRef::SensorGroup(group_index as u16),
                label: format!("Sensor {} of {}", sensor_position, config.sensor_count),
            }))
        }
    }
}

/// Dispatches one scan against the current slot. A rejected scan leaves the
/// session untouched; an accepted scan is recorded and the position advances.
pub fn record_scan(
    session: &mut ScanSession,
    config: &AssemblyTypeConfig,
    barcode: &str,
    scanned_at: DateTime<Utc>,
) -> Result<ScannedItem, ServiceError> {
    if !session.is_scannable() {
        return Err(ServiceError::InvalidOperation(format!(
            "assembly {} is {}, not accepting scans",
            session.assembly_id, session.status
        )));
    }
    let slot = expected_slot(session, config)?.ok_or_else(|| {
        ServiceError::InvalidOperation(format!(
            "assembly {} already has all {} items scanned",
            session.assembly_id,
            config.total_expected()
        ))
    })?;

    let barcode = barcode.trim();
    if barcode.is_empty() {
        return Err(ServiceError::Validation("empty barcode".to_string()));
    }
    if session.scanned_barcodes.contains(barcode) {
        return Err(ServiceError::DuplicateScan(format!(
            "barcode {} already recorded for assembly {}",
            barcode, session.assembly_id
        )));
    }
    if !verifier::verify(barcode, slot.verification_code.as_deref(), &slot.item_code) {
        return Err(ServiceError::Validation(format!(
            "barcode {} does not match {} (expected code {})",
            barcode,
            slot.label,
            slot.verification_code.as_deref().unwrap_or("<auto>")
        )));
    }

    let item = ScannedItem {
        position: slot.position,
        kind: slot.kind,
        item_code: slot.item_code,
        barcode: barcode.to_string(),
        scanned_at,
        slot_ref: slot.slot_ref,
    };
    session.scanned_barcodes.insert(item.barcode.clone());
    session.scanned_items.push(item.clone());
    session.current_position += 1;
    if session.status == crate::models::SessionStatus::Reset {
        session.status = crate::models::SessionStatus::InProgress;
    }
    Ok(item)
}
