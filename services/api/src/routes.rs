use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use portal_guard::leads::{lead_router, LeadRepository, LeadService};
use portal_guard::safety::{admin_router, safety_router, AdminToken, Gatekeeper, RegistryTransport};
use serde_json::json;
use std::sync::Arc;

/// Operational endpoints merged with the gatekeeper, administration and lead-capture routers.
pub(crate) fn with_portal_routes<R, T>(
    gatekeeper: Arc<Gatekeeper<T>>,
    leads: Arc<LeadService<R, T>>,
    admin_token: AdminToken,
) -> Router
where
    R: LeadRepository + 'static,
    T: RegistryTransport + 'static,
{
    safety_router(gatekeeper.clone())
        .merge(admin_router(gatekeeper, admin_token))
        .merge(lead_router(leads))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
