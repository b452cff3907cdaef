use std::collections::HashSet;

use dashmap::DashMap;

use crate::errors::ServiceError;
use crate::models::{CompletionRecord, ReworkEntry, ScanSession, SessionStatus};

/// Resilient in-process store, one normalized record per assembly id, with
/// secondary indices by status and by work order. This is the offline source
/// of truth: writes here are synchronous and surfaced, never fire-and-forget.
#[derive(Debug, Default)]
pub struct LocalStore {
    sessions: DashMap<String, ScanSession>,
    by_status: DashMap<SessionStatus, HashSet<String>>,
    by_work_order: DashMap<String, HashSet<String>>,
    completions: DashMap<String, CompletionRecord>,
    reworks: DashMap<String, Vec<ReworkEntry>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a session and keeps both secondary indices consistent.
    pub fn put_session(&self, session: ScanSession) -> Result<(), ServiceError> {
        let assembly_id = session.assembly_id.clone();
        if let Some(previous) = self.sessions.get(&assembly_id) {
            if previous.status != session.status {
                self.unindex_status(previous.status, &assembly_id);
            }
        }
        self.by_status
            .entry(session.status)
            .or_default()
            .insert(assembly_id.clone());
        self.by_work_order
            .entry(session.work_order_id.clone())
            .or_default()
            .insert(assembly_id.clone());
        self.sessions.insert(assembly_id, session);
        Ok(())
    }

    pub fn get_session(&self, assembly_id: &str) -> Option<ScanSession> {
        self.sessions.get(assembly_id).map(|s| s.value().clone())
    }

    /// Drops the session record and its index entries.
    pub fn remove_session(&self, assembly_id: &str) -> Result<(), ServiceError> {
        if let Some((_, session)) = self.sessions.remove(assembly_id) {
            self.unindex_status(session.status, assembly_id);
            if let Some(mut set) = self.by_work_order.get_mut(&session.work_order_id) {
                set.remove(assembly_id);
            }
        }
        Ok(())
    }

    pub fn sessions_by_status(&self, status: SessionStatus) -> Vec<String> {
        self.by_status
            .get(&status)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sessions_by_work_order(&self, work_order_id: &str) -> Vec<String> {
        self.by_work_order
            .get(work_order_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Shadow copy of a completion record, kept so finalize and rework keep
    /// working when the durable store is unreachable.
    pub fn put_completion(&self, record: CompletionRecord) -> Result<(), ServiceError> {
        self.completions
            .insert(record.assembly_id.clone(), record);
        Ok(())
    }

    pub fn get_completion(&self, assembly_id: &str) -> Option<CompletionRecord> {
        self.completions.get(assembly_id).map(|r| r.value().clone())
    }

    pub fn append_rework(&self, entry: ReworkEntry) -> Result<(), ServiceError> {
        self.reworks
            .entry(entry.original_assembly_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Number of rework cycles opened against an assembly by this process.
    /// Entries appended before a restart are not recoverable from the
    /// durable store, so the tally restarts with the process.
    pub fn rework_count(&self, assembly_id: &str) -> u32 {
        self.reworks
            .get(assembly_id)
            .map(|entries| entries.len() as u32)
            .unwrap_or(0)
    }

    fn unindex_status(&self, status: SessionStatus, assembly_id: &str) {
        if let Some(mut set) = self.by_status.get_mut(&status) {
            set.remove(assembly_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_moves_session_between_status_indices() {
        let store = LocalStore::new();
        let mut session = ScanSession::new("ASM-1", "WO-1", "RK-600-23A");
        store.put_session(session.clone()).unwrap();
        assert_eq!(
            store.sessions_by_status(SessionStatus::InProgress),
            vec!["ASM-1".to_string()]
        );

        session.status = SessionStatus::Completed;
        store.put_session(session).unwrap();
        assert!(store.sessions_by_status(SessionStatus::InProgress).is_empty());
        assert_eq!(
            store.sessions_by_status(SessionStatus::Completed),
            vec!["ASM-1".to_string()]
        );
    }

    #[test]
    fn work_order_index_tracks_members() {
        let store = LocalStore::new();
        store
            .put_session(ScanSession::new("ASM-1", "WO-1", "RK-600-23A"))
            .unwrap();
        store
            .put_session(ScanSession::new("ASM-2", "WO-1", "RK-600-23A"))
            .unwrap();
        let mut members = store.sessions_by_work_order("WO-1");
        members.sort();
        assert_eq!(members, vec!["ASM-1".to_string(), "ASM-2".to_string()]);

        store.remove_session("ASM-1").unwrap();
        assert_eq!(store.sessions_by_work_order("WO-1"), vec!["ASM-2".to_string()]);
    }

    #[test]
    fn rework_count_grows_with_appends() {
        let store = LocalStore::new();
        assert_eq!(store.rework_count("ASM-1"), 0);
        store
            .append_rework(ReworkEntry {
                original_assembly_id: "ASM-1".into(),
                rework_id: uuid::Uuid::new_v4(),
                assembly_barcode: "12342456789".into(),
                item_codes: vec![],
                reason: "QA defect".into(),
                rework_count: 1,
                created_at: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(store.rework_count("ASM-1"), 1);
    }
}
