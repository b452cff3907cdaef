use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CompletionRecord, ReworkEntry};
use crate::store::PersistenceGateway;

/// Reopens completed assemblies as new pending units. Append-only: the
/// original completion record is never mutated, and the new unit carries the
/// original traceability barcode and item identifiers so downstream
/// reporting still links the rework to its origin.
pub struct ReworkCoordinator {
    gateway: Arc<PersistenceGateway>,
    events: EventSender,
}

impl ReworkCoordinator {
    pub fn new(gateway: Arc<PersistenceGateway>, events: EventSender) -> Self {
        Self { gateway, events }
    }

    #[instrument(skip(self))]
    pub async fn rework(
        &self,
        assembly_id: &str,
        reason: &str,
    ) -> Result<ReworkEntry, ServiceError> {
        let record = self.locate_completion(assembly_id).await?;

        let entry = ReworkEntry {
            original_assembly_id: record.assembly_id.clone(),
            rework_id: Uuid::new_v4(),
            assembly_barcode: record.assembly_barcode.clone(),
            item_codes: record.items.iter().map(|i| i.item_code.clone()).collect(),
            reason: reason.to_string(),
            // The tally is process-local: the durable store exposes no
            // rework read-back, so after a process restart the count starts
            // again from the entries this process has appended.
            rework_count: self.gateway.local().rework_count(assembly_id) + 1,
            created_at: Utc::now(),
        };
        self.gateway.local().append_rework(entry.clone())?;

        let remote = self.gateway.remote();
        let events = self.events.clone();
        let remote_entry = entry.clone();
        tokio::spawn(async move {
            if let Err(err) = remote.submit_rework_entry(remote_entry.clone()).await {
                warn!(
                    assembly_id = %remote_entry.original_assembly_id,
                    "rework entry submission failed: {}",
                    err
                );
                events.send(Event::RemoteWriteFailed {
                    assembly_id: remote_entry.original_assembly_id,
                    detail: err.to_string(),
                });
            }
        });

        info!(
            assembly_id,
            rework_id = %entry.rework_id,
            rework_count = entry.rework_count,
            "rework opened"
        );
        self.events.send(Event::AssemblyReworkOpened {
            assembly_id: assembly_id.to_string(),
            rework_id: entry.rework_id,
            rework_count: entry.rework_count,
        });
        Ok(entry)
    }

    /// Finds the completion record remotely, falling back to the cached
    /// shadow; an assembly never completed cannot be reworked.
    async fn locate_completion(
        &self,
        assembly_id: &str,
    ) -> Result<CompletionRecord, ServiceError> {
        match self.gateway.remote().fetch_completion_record(assembly_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => self.cached_completion(assembly_id),
            Err(err) => {
                warn!(assembly_id, "remote completion fetch failed, using shadow: {}", err);
                self.cached_completion(assembly_id)
            }
        }
    }

    fn cached_completion(&self, assembly_id: &str) -> Result<CompletionRecord, ServiceError> {
        self.gateway
            .local()
            .get_completion(assembly_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no completion record for assembly {}",
                    assembly_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::models::{ScanKind, ScannedItem, SlotRef};
    use crate::store::remote::MockRemoteStore;
    use crate::store::LocalStore;
    use assert_matches::assert_matches;

    fn record(assembly_id: &str) -> CompletionRecord {
        CompletionRecord {
            assembly_id: assembly_id.to_string(),
            work_order_id: "WO-1".to_string(),
            assembly_barcode: "12342456789".to_string(),
            items: vec![ScannedItem {
                position: 1,
                kind: ScanKind::Component,
                item_code: "CTRL-MAIN".to_string(),
                barcode: "A1MCB00017".to_string(),
                scanned_at: Utc::now(),
                slot_ref: SlotRef::ComponentSequence(1),
            }],
            completed_at: Utc::now(),
            operator: "op-7".to_string(),
        }
    }

    fn coordinator_with(remote: MockRemoteStore) -> (ReworkCoordinator, Arc<PersistenceGateway>) {
        let (events, _rx) = events::channel(64);
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(LocalStore::new()),
            Arc::new(remote),
            events.clone(),
        ));
        (ReworkCoordinator::new(gateway.clone(), events), gateway)
    }

    #[tokio::test]
    async fn rework_without_completion_record_is_not_found() {
        let mut remote = MockRemoteStore::new();
        remote
            .expect_fetch_completion_record()
            .returning(|_| Ok(None));
        let (coordinator, _) = coordinator_with(remote);
        let err = coordinator.rework("ASM-ghost", "QA defect").await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn rework_preserves_original_identifiers_and_counts_up() {
        let mut remote = MockRemoteStore::new();
        remote
            .expect_fetch_completion_record()
            .returning(|id| Ok(Some(record(id))));
        remote
            .expect_submit_rework_entry()
            .returning(|_| Ok(()));
        let (coordinator, _) = coordinator_with(remote);

        let first = coordinator.rework("ASM-1", "QA defect").await.unwrap();
        assert_eq!(first.rework_count, 1);
        assert_eq!(first.assembly_barcode, "12342456789");
        assert_eq!(first.item_codes, vec!["CTRL-MAIN".to_string()]);

        let second = coordinator.rework("ASM-1", "QA defect again").await.unwrap();
        assert_eq!(second.rework_count, 2);
        assert_eq!(second.assembly_barcode, first.assembly_barcode);
        assert_ne!(second.rework_id, first.rework_id);
    }

    #[tokio::test]
    async fn rework_tally_is_per_process() {
        let remote_record = record("ASM-1");
        let mut first_remote = MockRemoteStore::new();
        first_remote
            .expect_fetch_completion_record()
            .returning(|id| Ok(Some(record(id))));
        first_remote
            .expect_submit_rework_entry()
            .returning(|_| Ok(()));
        let (first_coordinator, _) = coordinator_with(first_remote);
        let entry = first_coordinator.rework("ASM-1", "QA defect").await.unwrap();
        assert_eq!(entry.rework_count, 1);

        // A coordinator over a fresh local store only sees the completion
        // record remotely; its tally starts over.
        let mut second_remote = MockRemoteStore::new();
        second_remote
            .expect_fetch_completion_record()
            .returning(|id| Ok(Some(record(id))));
        second_remote
            .expect_submit_rework_entry()
            .returning(|_| Ok(()));
        let (second_coordinator, _) = coordinator_with(second_remote);
        let entry = second_coordinator.rework("ASM-1", "QA defect").await.unwrap();
        assert_eq!(entry.rework_count, 1);
        assert_eq!(entry.assembly_barcode, remote_record.assembly_barcode);
    }

    #[tokio::test]
    async fn rework_falls_back_to_cached_shadow_when_offline() {
        let mut remote = MockRemoteStore::new();
        remote
            .expect_fetch_completion_record()
            .returning(|_| Err(ServiceError::Connectivity("store offline".into())));
        remote
            .expect_submit_rework_entry()
            .returning(|_| Err(ServiceError::Connectivity("store offline".into())));
        let (coordinator, gateway) = coordinator_with(remote);
        gateway.local().put_completion(record("ASM-1")).unwrap();

        let entry = coordinator.rework("ASM-1", "QA defect").await.unwrap();
        assert_eq!(entry.original_assembly_id, "ASM-1");
        assert_eq!(entry.rework_count, 1);
    }
}
