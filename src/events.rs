use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ScanKind, WorkOrderStatus};

/// Audit events emitted by the scan engine. Consumers must never block the
/// operator path: senders drop the event (with a log line) when the channel
/// is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SessionStarted {
        assembly_id: String,
        work_order_id: String,
        assembly_type_id: String,
        resumed: bool,
    },
    ScanAccepted {
        assembly_id: String,
        position: u16,
        kind: ScanKind,
    },
    ScanRejected {
        assembly_id: String,
        reason: String,
    },
    SessionRestarted {
        assembly_id: String,
    },
    RemoteWriteFailed {
        assembly_id: String,
        detail: String,
    },
    AssemblyCompleted {
        assembly_id: String,
        assembly_barcode: String,
    },
    CompletionSubmissionFailed {
        assembly_id: String,
        detail: String,
    },
    WorkOrderQuantityUpdated {
        work_order_id: String,
        completed_quantity: u32,
        status: WorkOrderStatus,
    },
    AssemblyReworkOpened {
        assembly_id: String,
        rework_id: Uuid,
        rework_count: u32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event without blocking the caller. A full or closed channel
    /// loses the event; the audit log records the loss.
    pub fn send(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!("audit event dropped: {}", err);
        }
    }
}

/// Drains the event channel onto the audit log. Spawned once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::RemoteWriteFailed { assembly_id, detail } => {
                warn!(assembly_id = %assembly_id, detail = %detail, "remote write failed");
            }
            Event::CompletionSubmissionFailed { assembly_id, detail } => {
                warn!(
                    assembly_id = %assembly_id,
                    detail = %detail,
                    "completion record submission failed; retained locally for reconciliation"
                );
            }
            other => info!(event = ?other, "audit"),
        }
    }
}

/// Builds an event channel plus its sender wrapper.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}
