use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{ScanSession, SessionStatus};

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::{
    HttpRemoteStore, RemoteSession, RemoteStore, ScannedPartReport, SessionProgress,
    VerificationInfo,
};

/// Durable remote store plus resilient local cache, fronted as one gateway.
///
/// Loads prefer the remote record and fall back to the cache; saves write the
/// cache synchronously and the remote asynchronously, fire-and-forget. There
/// is no retry policy: a failed remote write is logged and left for manual
/// reconciliation.
pub struct PersistenceGateway {
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    events: EventSender,
    remote_reachable: AtomicBool,
}

impl PersistenceGateway {
    pub fn new(local: Arc<LocalStore>, remote: Arc<dyn RemoteStore>, events: EventSender) -> Self {
        Self {
            local,
            remote,
            events,
            remote_reachable: AtomicBool::new(false),
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    /// One-shot reachability probe at session start. The result is cached
    /// for reporting only; later writes are attempted regardless, since an
    /// operator may regain connectivity mid-session.
    pub async fn probe_connectivity(&self) -> bool {
        let reachable = self.remote.probe().await;
        self.remote_reachable.store(reachable, Ordering::Relaxed);
        if !reachable {
            info!("durable store offline at session start; continuing on local cache");
        }
        reachable
    }

    pub fn last_probe_result(&self) -> bool {
        self.remote_reachable.load(Ordering::Relaxed)
    }

    /// Restores a session: remote first, local cache on remote failure or
    /// absence, `None` when neither has a record.
    #[instrument(skip(self))]
    pub async fn load(&self, assembly_id: &str) -> Option<ScanSession> {
        match self.remote.fetch_assembly_session(assembly_id).await {
            Ok(Some(remote)) => Some(ScanSession::from_parts(
                remote.assembly_id,
                remote.work_order_id,
                remote.assembly_type_id,
                remote.scanned_items,
                remote.status,
            )),
            Ok(None) => self.local.get_session(assembly_id),
            Err(err) => {
                warn!(assembly_id, "remote session fetch failed, using cache: {}", err);
                self.local.get_session(assembly_id)
            }
        }
    }

    /// Persists an accepted scan. The cache write completes (or errors)
    /// before this returns; the remote write is spawned and never blocks the
    /// operator's next action.
    pub fn save(&self, session: &ScanSession) -> Result<(), ServiceError> {
        self.local.put_session(session.clone())?;

        let remote = self.remote.clone();
        let events = self.events.clone();
        let assembly_id = session.assembly_id.clone();
        let progress = SessionProgress {
            current_position: session.current_position,
            scanned_items: session.scanned_items.clone(),
            status: session.status,
        };
        tokio::spawn(async move {
            if let Err(err) = remote
                .update_assembly_session_progress(&assembly_id, progress)
                .await
            {
                warn!(assembly_id = %assembly_id, "session progress write failed: {}", err);
                events.send(Event::RemoteWriteFailed {
                    assembly_id,
                    detail: err.to_string(),
                });
            }
        });
        Ok(())
    }

    /// Reports an individual accepted part to the durable store,
    /// fire-and-forget like `save`.
    pub fn record_part(&self, assembly_id: &str, part: ScannedPartReport) {
        let remote = self.remote.clone();
        let events = self.events.clone();
        let assembly_id = assembly_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = remote.record_scanned_part(&assembly_id, part).await {
                warn!(assembly_id = %assembly_id, "part report failed: {}", err);
                events.send(Event::RemoteWriteFailed {
                    assembly_id,
                    detail: err.to_string(),
                });
            }
        });
    }

    /// Operator-initiated restart: the cached record is rewritten
    /// synchronously with cleared scan state, the remote progress fields are
    /// cleared best-effort.
    pub fn reset(&self, session: &ScanSession) -> Result<(), ServiceError> {
        debug_assert_eq!(session.status, SessionStatus::Reset);
        self.local.put_session(session.clone())?;

        let remote = self.remote.clone();
        let assembly_id = session.assembly_id.clone();
        tokio::spawn(async move {
            if let Err(err) = remote.clear_assembly_session_progress(&assembly_id).await {
                warn!(assembly_id = %assembly_id, "remote progress clear failed: {}", err);
            }
        });
        Ok(())
    }
}
