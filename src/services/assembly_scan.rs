use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    AssemblyTypeConfig, CompletionRecord, ReworkEntry, ScanKind, ScanSession, SessionStatus,
    COMPONENT_COUNT,
};
use crate::services::config_registry::ConfigRegistry;
use crate::services::finalizer::CompletionFinalizer;
use crate::services::progress::{self, ProgressSnapshot};
use crate::services::rework::ReworkCoordinator;
use crate::services::sequencer;
use crate::store::{PersistenceGateway, ScannedPartReport};

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub assembly_id: String,
    pub work_order_id: String,
    pub assembly_type_id: String,
    /// Sensor slots physically present in the current layout; used only
    /// when the assembly type is unrecognized and a configuration must be
    /// synthesized.
    pub sensor_count_hint: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub assembly_id: String,
    pub work_order_id: String,
    pub assembly_type_id: String,
    pub status: SessionStatus,
    pub resumed: bool,
    pub remote_reachable: bool,
    pub progress: ProgressSnapshot,
    pub next_expected_label: Option<String>,
}

/// Locally recoverable scan rejections, surfaced synchronously inside the
/// scan outcome. Everything else propagates as a `ServiceError`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    Validation,
    DuplicateScan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ScanErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub next_expected_label: Option<String>,
    pub progress: ProgressSnapshot,
}

struct SessionEntry {
    session: ScanSession,
    config: Arc<AssemblyTypeConfig>,
}

/// Operator-facing command surface over the scan engine. Sessions are
/// explicit objects keyed by assembly id; every method is callable
/// identically from HTTP handlers, automated tests, or a batch tool.
///
/// Each session entry sits behind its own mutex, so one scan's
/// validate→record→persist pipeline finishes before the next scan for the
/// same assembly is considered. Concurrent devices on the same assembly id
/// remain unguarded beyond this process.
pub struct AssemblyScanService {
    registry: Arc<ConfigRegistry>,
    gateway: Arc<PersistenceGateway>,
    finalizer: CompletionFinalizer,
    rework: ReworkCoordinator,
    events: EventSender,
    sessions: DashMap<String, Arc<Mutex<SessionEntry>>>,
}

impl AssemblyScanService {
    pub fn new(
        registry: Arc<ConfigRegistry>,
        gateway: Arc<PersistenceGateway>,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            finalizer: CompletionFinalizer::new(gateway.clone(), events.clone()),
            rework: ReworkCoordinator::new(gateway.clone(), events.clone()),
            gateway,
            events,
            sessions: DashMap::new(),
        }
    }

    /// Starts or resumes a session: probes connectivity once, restores any
    /// persisted state, resolves the type configuration, and overlays
    /// verification codes from the durable store. Scanning against an
    /// assembly id without a started session yields `NotReady`.
    #[instrument(skip(self, request), fields(assembly_id = %request.assembly_id))]
    pub async fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> Result<SessionView, ServiceError> {
        let reachable = self.gateway.probe_connectivity().await;

        let (session, resumed) = match self.gateway.load(&request.assembly_id).await {
            Some(session) => (session, true),
            None => (
                ScanSession::new(
                    &request.assembly_id,
                    &request.work_order_id,
                    &request.assembly_type_id,
                ),
                false,
            ),
        };

        let static_config = self
            .registry
            .resolve(&session.assembly_type_id, request.sensor_count_hint);
        let config = self
            .registry
            .refresh_verification_codes(&static_config, self.gateway.remote().as_ref())
            .await;

        self.gateway.save(&session)?;
        let view = self.view_of(&session, &config, resumed, reachable)?;

        self.events.send(Event::SessionStarted {
            assembly_id: session.assembly_id.clone(),
            work_order_id: session.work_order_id.clone(),
            assembly_type_id: session.assembly_type_id.clone(),
            resumed,
        });
        info!(resumed, "session ready");

        self.sessions.insert(
            session.assembly_id.clone(),
            Arc::new(Mutex::new(SessionEntry { session, config })),
        );
        Ok(view)
    }

    /// Runs one scan through the full validate→record→persist pipeline.
    /// Validation and duplicate rejections come back inside the outcome;
    /// the session is unchanged and the operator is re-prompted.
    #[instrument(skip(self, barcode, operator))]
    pub async fn submit_scan(
        &self,
        assembly_id: &str,
        barcode: &str,
        operator: &str,
    ) -> Result<ScanOutcome, ServiceError> {
        let entry = self.entry(assembly_id)?;
        let mut entry = entry.lock().await;
        let SessionEntry { session, config } = &mut *entry;

        let item = match sequencer::record_scan(session, config, barcode, Utc::now()) {
            Ok(item) => item,
            Err(err @ (ServiceError::Validation(_) | ServiceError::DuplicateScan(_))) => {
                let kind = match &err {
                    ServiceError::Validation(_) => ScanErrorKind::Validation,
                    _ => ScanErrorKind::DuplicateScan,
                };
                self.events.send(Event::ScanRejected {
                    assembly_id: assembly_id.to_string(),
                    reason: err.to_string(),
                });
                return Ok(ScanOutcome {
                    accepted: false,
                    error_kind: Some(kind),
                    message: Some(err.to_string()),
                    next_expected_label: self.next_label(session, config)?,
                    progress: progress::snapshot(session, config),
                });
            }
            Err(err) => return Err(err),
        };

        // Local cache write is synchronous and surfaced; the remote writes
        // are fire-and-forget.
        self.gateway.save(session)?;
        self.gateway.record_part(
            assembly_id,
            ScannedPartReport {
                barcode: item.barcode.clone(),
                sensor_position: match item.kind {
                    ScanKind::Sensor => Some(item.position - COMPONENT_COUNT),
                    ScanKind::Component => None,
                },
                operator: operator.to_string(),
            },
        );
        self.events.send(Event::ScanAccepted {
            assembly_id: assembly_id.to_string(),
            position: item.position,
            kind: item.kind,
        });

        Ok(ScanOutcome {
            accepted: true,
            error_kind: None,
            message: None,
            next_expected_label: self.next_label(session, config)?,
            progress: progress::snapshot(session, config),
        })
    }

    pub async fn get_progress(&self, assembly_id: &str) -> Result<ProgressSnapshot, ServiceError> {
        let entry = self.entry(assembly_id)?;
        let entry = entry.lock().await;
        Ok(progress::snapshot(&entry.session, &entry.config))
    }

    /// Finalizes a fully scanned assembly into its immutable completion
    /// record. One-way; the superseded session stays inspectable.
    #[instrument(skip(self, operator))]
    pub async fn complete_assembly(
        &self,
        assembly_id: &str,
        operator: &str,
    ) -> Result<CompletionRecord, ServiceError> {
        let entry = self.entry(assembly_id)?;
        let mut entry = entry.lock().await;
        let SessionEntry { session, config } = &mut *entry;
        self.finalizer.finalize(session, config, operator).await
    }

    /// Operator-initiated restart: scan state back to position 1,
    /// identifiers preserved, local cache cleared synchronously, remote
    /// progress cleared best-effort.
    #[instrument(skip(self))]
    pub async fn restart_assembly(&self, assembly_id: &str) -> Result<(), ServiceError> {
        let entry = self.entry(assembly_id)?;
        let mut entry = entry.lock().await;
        entry.session.reset();
        self.gateway.reset(&entry.session)?;
        self.events.send(Event::SessionRestarted {
            assembly_id: assembly_id.to_string(),
        });
        Ok(())
    }

    /// Reopens a completed assembly as a new pending unit. The in-memory
    /// session, if any, is reset for the next scan cycle; the completion
    /// record itself is untouched.
    #[instrument(skip(self, reason))]
    pub async fn request_rework(
        &self,
        assembly_id: &str,
        reason: &str,
    ) -> Result<ReworkEntry, ServiceError> {
        let entry = self.rework.rework(assembly_id, reason).await?;
        if let Some(session_entry) = self.sessions.get(assembly_id) {
            let mut session_entry = session_entry.lock().await;
            session_entry.session.reset();
            self.gateway.reset(&session_entry.session)?;
        }
        Ok(entry)
    }

    fn entry(&self, assembly_id: &str) -> Result<Arc<Mutex<SessionEntry>>, ServiceError> {
        self.sessions
            .get(assembly_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| {
                ServiceError::NotReady(format!(
                    "no active session for assembly {}; start one first",
                    assembly_id
                ))
            })
    }

    fn next_label(
        &self,
        session: &ScanSession,
        config: &AssemblyTypeConfig,
    ) -> Result<Option<String>, ServiceError> {
        Ok(sequencer::expected_slot(session, config)?.map(|slot| slot.label))
    }

    fn view_of(
        &self,
        session: &ScanSession,
        config: &AssemblyTypeConfig,
        resumed: bool,
        remote_reachable: bool,
    ) -> Result<SessionView, ServiceError> {
        Ok(SessionView {
            assembly_id: session.assembly_id.clone(),
            work_order_id: session.work_order_id.clone(),
            assembly_type_id: session.assembly_type_id.clone(),
            status: session.status,
            resumed,
            remote_reachable,
            progress: progress::snapshot(session, config),
            next_expected_label: self.next_label(session, config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::store::remote::MockRemoteStore;
    use crate::store::LocalStore;
    use assert_matches::assert_matches;

    fn offline_remote() -> MockRemoteStore {
        let mut remote = MockRemoteStore::new();
        remote.expect_probe().returning(|| false);
        remote
            .expect_fetch_assembly_session()
            .returning(|_| Err(ServiceError::Connectivity("store offline".into())));
        remote
            .expect_lookup_item_verification_info()
            .returning(|_| Err(ServiceError::Connectivity("store offline".into())));
        remote
            .expect_update_assembly_session_progress()
            .returning(|_, _| Err(ServiceError::Connectivity("store offline".into())));
        remote
            .expect_record_scanned_part()
            .returning(|_, _| Err(ServiceError::Connectivity("store offline".into())));
        remote
            .expect_clear_assembly_session_progress()
            .returning(|_| Err(ServiceError::Connectivity("store offline".into())));
        remote
    }

    fn service_with(remote: MockRemoteStore) -> AssemblyScanService {
        let (events, _rx) = events::channel(256);
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(LocalStore::new()),
            Arc::new(remote),
            events.clone(),
        ));
        AssemblyScanService::new(Arc::new(ConfigRegistry::with_builtin_catalog()), gateway, events)
    }

    fn start_request() -> StartSessionRequest {
        StartSessionRequest {
            assembly_id: "ASM-1".into(),
            work_order_id: "WO-1".into(),
            assembly_type_id: "RK-600-16B".into(),
            sensor_count_hint: None,
        }
    }

    #[tokio::test]
    async fn scanning_before_start_is_not_ready() {
        let service = service_with(offline_remote());
        let err = service.submit_scan("ASM-1", "A1MCB00017", "op-7").await.unwrap_err();
        assert_matches!(err, ServiceError::NotReady(_));
    }

    #[tokio::test]
    async fn full_pipeline_runs_offline_on_local_cache() {
        let service = service_with(offline_remote());
        let view = service.start_session(start_request()).await.unwrap();
        assert!(!view.resumed);
        assert!(!view.remote_reachable);
        assert_eq!(view.progress.total_count, 22);
        assert_eq!(
            view.next_expected_label.as_deref(),
            Some("Component 1 of 6: Main controller board")
        );

        let outcome = service.submit_scan("ASM-1", "A1MCB00017", "op-7").await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.progress.scanned_count, 1);
        assert_eq!(
            outcome.next_expected_label.as_deref(),
            Some("Component 2 of 6: Power supply")
        );
    }

    #[tokio::test]
    async fn rejections_surface_in_the_outcome_not_as_errors() {
        let service = service_with(offline_remote());
        service.start_session(start_request()).await.unwrap();

        let rejected = service.submit_scan("ASM-1", "WRONGCODE", "op-7").await.unwrap();
        assert!(!rejected.accepted);
        assert_eq!(rejected.error_kind, Some(ScanErrorKind::Validation));
        assert_eq!(rejected.progress.scanned_count, 0);

        service.submit_scan("ASM-1", "A1MCB00017", "op-7").await.unwrap();
        let duplicate = service.submit_scan("ASM-1", "A1MCB00017", "op-7").await.unwrap();
        assert!(!duplicate.accepted);
        assert_eq!(duplicate.error_kind, Some(ScanErrorKind::DuplicateScan));
        assert_eq!(duplicate.progress.scanned_count, 1);
    }

    #[tokio::test]
    async fn restart_zeroes_progress_and_keeps_identifiers() {
        let service = service_with(offline_remote());
        service.start_session(start_request()).await.unwrap();
        service.submit_scan("ASM-1", "A1MCB00017", "op-7").await.unwrap();

        service.restart_assembly("ASM-1").await.unwrap();
        let snap = service.get_progress("ASM-1").await.unwrap();
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.scanned_count, 0);
        assert_eq!(snap.total_count, 22);

        // Identifiers survive in the cached record.
        let entry = service.entry("ASM-1").unwrap();
        let entry = entry.lock().await;
        assert_eq!(entry.session.assembly_id, "ASM-1");
        assert_eq!(entry.session.work_order_id, "WO-1");
    }

    #[tokio::test]
    async fn session_resumes_from_remote_snapshot() {
        let mut remote = MockRemoteStore::new();
        remote.expect_probe().returning(|| true);
        remote.expect_fetch_assembly_session().returning(|id| {
            use crate::store::RemoteSession;
            let mut session = ScanSession::new(id, "WO-1", "RK-600-16B");
            sequencer::record_scan(
                &mut session,
                &ConfigRegistry::with_builtin_catalog().resolve("RK-600-16B", None),
                "A1MCB00017",
                Utc::now(),
            )
            .unwrap();
            Ok(Some(RemoteSession {
                assembly_id: session.assembly_id,
                work_order_id: session.work_order_id,
                assembly_type_id: session.assembly_type_id,
                current_position: session.current_position,
                scanned_items: session.scanned_items,
                status: session.status,
            }))
        });
        remote
            .expect_lookup_item_verification_info()
            .returning(|_| Err(ServiceError::Connectivity("lookup down".into())));
        remote
            .expect_update_assembly_session_progress()
            .returning(|_, _| Ok(()));

        let service = service_with(remote);
        let view = service.start_session(start_request()).await.unwrap();
        assert!(view.resumed);
        assert_eq!(view.progress.scanned_count, 1);
        assert_eq!(
            view.next_expected_label.as_deref(),
            Some("Component 2 of 6: Power supply")
        );
    }
}
