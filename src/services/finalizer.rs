use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    AssemblyTypeConfig, CompletionRecord, ScanSession, ScannedItem, SessionStatus,
};
use crate::services::progress;
use crate::store::PersistenceGateway;

/// Constant marker distinguishing assembly-class traceability barcodes from
/// component-class barcodes.
const ASSEMBLY_CLASS_MARKER: &str = "24";

/// Generates the 11-character traceability barcode: four random digits, the
/// assembly-class marker, five random digits.
pub fn generate_assembly_barcode() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{:04}{}{:05}",
        rng.gen_range(0..10_000u32),
        ASSEMBLY_CLASS_MARKER,
        rng.gen_range(0..100_000u32)
    )
}

/// Merges component and sensor scans into one ordered list, deduplicating by
/// barcode so a sensor scan that coincidentally shares a barcode with an
/// already-recorded component is not double-counted.
pub fn merged_items(session: &ScanSession) -> Vec<ScannedItem> {
    let mut seen: HashSet<&str> = HashSet::new();
    session
        .scanned_items
        .iter()
        .filter(|item| seen.insert(item.barcode.as_str()))
        .cloned()
        .collect()
}

/// Turns a fully scanned session into an immutable completion record and
/// pushes the downstream side effects: record submission and the work
/// order's quantity/status update. Both are tolerated failing; the local
/// record always stands and reconciliation is manual.
pub struct CompletionFinalizer {
    gateway: Arc<PersistenceGateway>,
    events: EventSender,
}

impl CompletionFinalizer {
    pub fn new(gateway: Arc<PersistenceGateway>, events: EventSender) -> Self {
        Self { gateway, events }
    }

    /// Callable only when the strict completion predicate holds. One-way:
    /// the session is marked Completed (superseded, not deleted, so it stays
    /// inspectable for audit).
    #[instrument(skip(self, session, config), fields(assembly_id = %session.assembly_id))]
    pub async fn finalize(
        &self,
        session: &mut ScanSession,
        config: &AssemblyTypeConfig,
        operator: &str,
    ) -> Result<CompletionRecord, ServiceError> {
        if !progress::is_fully_complete(session, config) {
            return Err(ServiceError::InvalidOperation(format!(
                "assembly {} is not fully scanned ({} of {})",
                session.assembly_id,
                session.scanned_items.len(),
                config.total_expected()
            )));
        }
        if session.status == SessionStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "assembly {} is already completed",
                session.assembly_id
            )));
        }

        let record = CompletionRecord {
            assembly_id: session.assembly_id.clone(),
            work_order_id: session.work_order_id.clone(),
            assembly_barcode: generate_assembly_barcode(),
            items: merged_items(session),
            completed_at: Utc::now(),
            operator: operator.to_string(),
        };

        // The local shadow is written before any remote attempt so a
        // submission failure can never lose the record.
        self.gateway.local().put_completion(record.clone())?;
        session.status = SessionStatus::Completed;
        // The superseding status must reach the remote snapshot too, or a
        // later resume would reopen the assembly as in-progress and a second
        // record could be minted.
        self.gateway.save(session)?;

        let remote = self.gateway.remote();
        if let Err(err) = remote.submit_completion_record(record.clone()).await {
            let err = ServiceError::Completion(format!(
                "record for assembly {} not submitted: {}",
                record.assembly_id, err
            ));
            warn!(assembly_id = %record.assembly_id, "{}", err);
            self.events.send(Event::CompletionSubmissionFailed {
                assembly_id: record.assembly_id.clone(),
                detail: err.to_string(),
            });
        }

        self.update_work_order(&record.work_order_id).await;

        info!(
            assembly_id = %record.assembly_id,
            assembly_barcode = %record.assembly_barcode,
            "assembly completed"
        );
        self.events.send(Event::AssemblyCompleted {
            assembly_id: record.assembly_id.clone(),
            assembly_barcode: record.assembly_barcode.clone(),
        });
        Ok(record)
    }

    /// Increments the originating work order's completed quantity, setting
    /// status Completed once the counter reaches the ordered quantity.
    /// Independent of record submission; failures only touch the audit channel.
    async fn update_work_order(&self, work_order_id: &str) {
        let remote = self.gateway.remote();
        let work_order = match remote.fetch_work_order(work_order_id).await {
            Ok(Some(wo)) => wo,
            Ok(None) => {
                warn!(work_order_id, "work order not found, quantity not updated");
                return;
            }
            Err(err) => {
                warn!(work_order_id, "work order fetch failed: {}", err);
                return;
            }
        };
        let completed_quantity = work_order.completed_quantity + 1;
        let status = work_order.status_after_increment();
        if let Err(err) = remote
            .update_work_order_quantity_and_status(work_order_id, completed_quantity, status)
            .await
        {
            warn!(work_order_id, "work order update failed: {}", err);
            return;
        }
        self.events.send(Event::WorkOrderQuantityUpdated {
            work_order_id: work_order_id.to_string(),
            completed_quantity,
            status,
        });
    }
}
