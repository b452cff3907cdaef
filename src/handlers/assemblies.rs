use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::errors::ServiceError;
use crate::models::{CompletionRecord, ReworkEntry};
use crate::services::assembly_scan::{ScanOutcome, SessionView, StartSessionRequest};
use crate::services::progress::ProgressSnapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    pub work_order_id: String,
    pub assembly_type_id: String,
    pub sensor_count_hint: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScanBody {
    pub barcode: String,
    pub operator: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub operator: String,
}

#[derive(Debug, Deserialize)]
pub struct ReworkBody {
    pub reason: String,
}

/// Routes for the operator-facing scan workflow. Thin over
/// `AssemblyScanService`; all engine logic stays headless.
pub fn assemblies_router() -> Router<AppState> {
    Router::new()
        .route("/:id/session", post(start_session))
        .route("/:id/scans", post(submit_scan))
        .route("/:id/progress", get(get_progress))
        .route("/:id/complete", post(complete_assembly))
        .route("/:id/restart", post(restart_assembly))
        .route("/:id/rework", post(request_rework))
}

async fn start_session(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
    Json(body): Json<StartSessionBody>,
) -> Result<Json<SessionView>, ServiceError> {
    let view = state
        .scan_service
        .start_session(StartSessionRequest {
            assembly_id,
            work_order_id: body.work_order_id,
            assembly_type_id: body.assembly_type_id,
            sensor_count_hint: body.sensor_count_hint,
        })
        .await?;
    Ok(Json(view))
}

async fn submit_scan(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
    Json(body): Json<SubmitScanBody>,
) -> Result<Json<ScanOutcome>, ServiceError> {
    let outcome = state
        .scan_service
        .submit_scan(&assembly_id, &body.barcode, &body.operator)
        .await?;
    Ok(Json(outcome))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
) -> Result<Json<ProgressSnapshot>, ServiceError> {
    let snapshot = state.scan_service.get_progress(&assembly_id).await?;
    Ok(Json(snapshot))
}

async fn complete_assembly(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<CompletionRecord>, ServiceError> {
    let record = state
        .scan_service
        .complete_assembly(&assembly_id, &body.operator)
        .await?;
    Ok(Json(record))
}

async fn restart_assembly(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    state.scan_service.restart_assembly(&assembly_id).await?;
    Ok(Json(serde_json::json!({ "status": "reset" })))
}

async fn request_rework(
    State(state): State<AppState>,
    Path(assembly_id): Path<String>,
    Json(body): Json<ReworkBody>,
) -> Result<Json<ReworkEntry>, ServiceError> {
    let entry = state
        .scan_service
        .request_rework(&assembly_id, &body.reason)
        .await?;
    Ok(Json(entry))
}
