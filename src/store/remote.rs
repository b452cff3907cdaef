use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;
use crate::models::{
    CompletionRecord, ReworkEntry, ScannedItem, SessionStatus, WorkOrder, WorkOrderStatus,
};

/// Verification data served per item code by the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub verification_code: Option<String>,
    pub description: Option<String>,
}

/// Wire shape of a persisted assembly session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSession {
    pub assembly_id: String,
    pub work_order_id: String,
    pub assembly_type_id: String,
    pub current_position: u16,
    pub scanned_items: Vec<ScannedItem>,
    pub status: SessionStatus,
}

/// Progress payload written after every accepted scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgress {
    pub current_position: u16,
    pub scanned_items: Vec<ScannedItem>,
    pub status: SessionStatus,
}

/// Per-part traceability report, one per accepted scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedPartReport {
    pub barcode: String,
    pub sensor_position: Option<u16>,
    pub operator: String,
}

/// Abstract operations consumed from the durable remote store. The store's
/// own schema is not ours to define; this trait is the whole interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn lookup_item_verification_info(
        &self,
        item_code: &str,
    ) -> Result<VerificationInfo, ServiceError>;

    async fn fetch_assembly_session(
        &self,
        assembly_id: &str,
    ) -> Result<Option<RemoteSession>, ServiceError>;

    async fn update_assembly_session_progress(
        &self,
        assembly_id: &str,
        progress: SessionProgress,
    ) -> Result<(), ServiceError>;

    /// Best-effort wipe of the remote record's progress fields on restart.
    async fn clear_assembly_session_progress(&self, assembly_id: &str)
        -> Result<(), ServiceError>;

    async fn submit_completion_record(
        &self,
        record: CompletionRecord,
    ) -> Result<(), ServiceError>;

    async fn fetch_completion_record(
        &self,
        assembly_id: &str,
    ) -> Result<Option<CompletionRecord>, ServiceError>;

    async fn fetch_work_order(&self, work_order_id: &str)
        -> Result<Option<WorkOrder>, ServiceError>;

    async fn update_work_order_quantity_and_status(
        &self,
        work_order_id: &str,
        completed_quantity: u32,
        status: WorkOrderStatus,
    ) -> Result<(), ServiceError>;

    async fn record_scanned_part(
        &self,
        assembly_id: &str,
        part: ScannedPartReport,
    ) -> Result<(), ServiceError>;

    async fn submit_rework_entry(&self, entry: ReworkEntry) -> Result<(), ServiceError>;

    /// Lightweight reachability check, probed once at session start.
    async fn probe(&self) -> bool;
}

/// HTTP client for the durable store.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpRemoteStore {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a 404 to `None`, other non-success statuses to an error.
    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ServiceError> {
        let response = self.client.get(self.url(path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| ServiceError::ExternalService(e.to_string()))?;
        Ok(Some(response.json::<T>().await?))
    }

    async fn put_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ServiceError> {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ServiceError::ExternalService(e.to_string()))?;
        Ok(())
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ServiceError> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ServiceError::ExternalService(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    #[instrument(skip(self))]
    async fn lookup_item_verification_info(
        &self,
        item_code: &str,
    ) -> Result<VerificationInfo, ServiceError> {
        let info: Option<VerificationInfo> = self
            .get_optional(&format!("/items/{}/verification", item_code))
            .await?;
        info.ok_or_else(|| {
            ServiceError::NotFound(format!("no verification info for item {}", item_code))
        })
    }

    #[instrument(skip(self))]
    async fn fetch_assembly_session(
        &self,
        assembly_id: &str,
    ) -> Result<Option<RemoteSession>, ServiceError> {
        self.get_optional(&format!("/assembly-sessions/{}", assembly_id))
            .await
    }

    #[instrument(skip(self, progress))]
    async fn update_assembly_session_progress(
        &self,
        assembly_id: &str,
        progress: SessionProgress,
    ) -> Result<(), ServiceError> {
        self.put_json(&format!("/assembly-sessions/{}/progress", assembly_id), &progress)
            .await
    }

    #[instrument(skip(self))]
    async fn clear_assembly_session_progress(
        &self,
        assembly_id: &str,
    ) -> Result<(), ServiceError> {
        self.client
            .delete(self.url(&format!("/assembly-sessions/{}/progress", assembly_id)))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ServiceError::ExternalService(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn submit_completion_record(
        &self,
        record: CompletionRecord,
    ) -> Result<(), ServiceError> {
        let path = format!("/assemblies/{}/completion", record.assembly_id);
        self.post_json(&path, &record).await
    }

    #[instrument(skip(self))]
    async fn fetch_completion_record(
        &self,
        assembly_id: &str,
    ) -> Result<Option<CompletionRecord>, ServiceError> {
        self.get_optional(&format!("/assemblies/{}/completion", assembly_id))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_work_order(
        &self,
        work_order_id: &str,
    ) -> Result<Option<WorkOrder>, ServiceError> {
        self.get_optional(&format!("/work-orders/{}", work_order_id))
            .await
    }

    #[instrument(skip(self))]
    async fn update_work_order_quantity_and_status(
        &self,
        work_order_id: &str,
        completed_quantity: u32,
        status: WorkOrderStatus,
    ) -> Result<(), ServiceError> {
        #[derive(Serialize)]
        struct Body {
            completed_quantity: u32,
            status: WorkOrderStatus,
        }
        self.put_json(
            &format!("/work-orders/{}/quantity", work_order_id),
            &Body {
                completed_quantity,
                status,
            },
        )
        .await
    }

    #[instrument(skip(self, part))]
    async fn record_scanned_part(
        &self,
        assembly_id: &str,
        part: ScannedPartReport,
    ) -> Result<(), ServiceError> {
        self.post_json(&format!("/assemblies/{}/parts", assembly_id), &part)
            .await
    }

    #[instrument(skip(self, entry))]
    async fn submit_rework_entry(&self, entry: ReworkEntry) -> Result<(), ServiceError> {
        let path = format!("/assemblies/{}/rework", entry.original_assembly_id);
        self.post_json(&path, &entry).await
    }

    async fn probe(&self) -> bool {
        let request = self
            .client
            .get(self.url("/health"))
            .timeout(self.probe_timeout)
            .send();
        match request.await {
            Ok(response) => {
                debug!(status = %response.status(), "remote store probe");
                response.status().is_success()
            }
            Err(err) => {
                warn!("remote store unreachable: {}", err);
                false
            }
        }
    }
}
