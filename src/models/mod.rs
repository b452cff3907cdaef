pub mod assembly_type;
pub mod completion;
pub mod scan_session;
pub mod work_order;

pub use assembly_type::{AssemblyTypeConfig, ComponentSpec, SensorGroup, COMPONENT_COUNT};
pub use completion::{CompletionRecord, ReworkEntry};
pub use scan_session::{ScanKind, ScanSession, ScannedItem, SessionStatus, SlotRef};
pub use work_order::{WorkOrder, WorkOrderStatus};
