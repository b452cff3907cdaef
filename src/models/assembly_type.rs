use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Every assembly type carries exactly this many major components, scanned
/// first and in a fixed order.
pub const COMPONENT_COUNT: u16 = 6;

/// One of the six major sub-parts of an assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentSpec {
    pub id: String,
    pub item_code: String,
    pub name: String,
    /// Short reference string the verifier matches against scanned barcodes.
    /// `None` (or empty) means the slot auto-passes.
    pub verification_code: Option<String>,
    /// Scan order, 1-based. The set of indices across a config is exactly 1..=6.
    pub sequence_index: u16,
}

/// A run of sensor positions sharing one verification code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SensorGroup {
    /// `None` means sensors in this group auto-pass verification.
    pub code: Option<String>,
    /// 1-based sensor positions covered by this group.
    pub positions: BTreeSet<u16>,
}

/// Per-product-type scan specification: the fixed component bill of
/// materials plus the variant's sensor layout and verification scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyTypeConfig {
    pub id: String,
    pub components: Vec<ComponentSpec>,
    pub sensor_count: u16,
    /// Ordered groups covering every position 1..=sensor_count exactly once.
    pub sensor_groups: Vec<SensorGroup>,
    pub sensor_item_codes: HashMap<u16, String>,
}

impl AssemblyTypeConfig {
    /// Checks the structural invariants: six components with sequence
    /// indices exactly {1..6}, and every sensor position covered by exactly
    /// one verification group.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.components.len() != COMPONENT_COUNT as usize {
            return Err(ServiceError::Configuration(format!(
                "assembly type {} defines {} components, expected {}",
                self.id,
                self.components.len(),
                COMPONENT_COUNT
            )));
        }
        let mut indices: Vec<u16> = self.components.iter().map(|c| c.sequence_index).collect();
        indices.sort_unstable();
        if indices != (1..=COMPONENT_COUNT).collect::<Vec<_>>() {
            return Err(ServiceError::Configuration(format!(
                "assembly type {} has non-contiguous component sequence indices {:?}",
                self.id, indices
            )));
        }
        let mut covered: BTreeSet<u16> = BTreeSet::new();
        for group in &self.sensor_groups {
            for pos in &group.positions {
                if !covered.insert(*pos) {
                    return Err(ServiceError::Configuration(format!(
                        "assembly type {} assigns sensor position {} to more than one group",
                        self.id, pos
                    )));
                }
            }
        }
        let expected: BTreeSet<u16> = (1..=self.sensor_count).collect();
        if covered != expected {
            return Err(ServiceError::Configuration(format!(
                "assembly type {} sensor groups cover {:?}, expected 1..={}",
                self.id, covered, self.sensor_count
            )));
        }
        Ok(())
    }

    /// Total number of items a complete session must record.
    pub fn total_expected(&self) -> u16 {
        COMPONENT_COUNT + self.sensor_count
    }

    /// The component scanned at the given 1-based sequence position.
    pub fn component_at(&self, sequence_index: u16) -> Option<&ComponentSpec> {
        self.components
            .iter()
            .find(|c| c.sequence_index == sequence_index)
    }

    /// The verification group covering the given 1-based sensor position.
    pub fn sensor_group_for(&self, position: u16) -> Option<&SensorGroup> {
        self.sensor_groups
            .iter()
            .find(|g| g.positions.contains(&position))
    }

    pub fn sensor_item_code(&self, position: u16) -> Option<&str> {
        self.sensor_item_codes.get(&position).map(|s| s.as_str())
    }
}
