//! Manufacturing execution service that walks an operator through scanning
//! components and sensors into a partially built assembly, validates each
//! scan against the product type's specification, and finalizes fully
//! scanned assemblies into immutable traceability records.
//!
//! The engine is headless: `services::assembly_scan::AssemblyScanService`
//! exposes explicit command methods (`submit_scan`, `complete_assembly`,
//! `restart_assembly`, `request_rework`) that the HTTP handlers, tests, or a
//! batch tool call identically.

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::assembly_scan::AssemblyScanService;
use store::PersistenceGateway;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub scan_service: Arc<AssemblyScanService>,
    pub gateway: Arc<PersistenceGateway>,
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health_router())
        .nest("/assemblies", handlers::assemblies_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
