use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkOrderStatus {
    Pending,
    InProgress,
    Completed,
}

/// The slice of a work order the finalizer needs: how many units were
/// ordered and how many have been completed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    pub ordered_quantity: u32,
    pub completed_quantity: u32,
    pub status: WorkOrderStatus,
}

impl WorkOrder {
    /// Status after one more unit completes.
    pub fn status_after_increment(&self) -> WorkOrderStatus {
        if self.completed_quantity + 1 >= self.ordered_quantity {
            WorkOrderStatus::Completed
        } else {
            WorkOrderStatus::InProgress
        }
    }
}
