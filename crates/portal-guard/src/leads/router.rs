use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;

use super::domain::LeadSubmission;
use super::repository::LeadRepository;
use super::service::{LeadService, LeadServiceError};
use crate::safety::{DenialReason, RegistryTransport};

/// Router exposing the lead-capture endpoint.
pub fn lead_router<R, T>(service: Arc<LeadService<R, T>>) -> Router
where
    R: LeadRepository + 'static,
    T: RegistryTransport + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(submit_handler::<R, T>))
        .with_state(service)
}

pub(crate) async fn submit_handler<R, T>(
    State(service): State<Arc<LeadService<R, T>>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<LeadSubmission>,
) -> Response
where
    R: LeadRepository + 'static,
    T: RegistryTransport + 'static,
{
    match service.submit(submission, &headers).await {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record.receipt())).into_response(),
        Err(LeadServiceError::MissingContact) => {
            let payload = json!({ "error": "an email address is required" });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::Rejected(decision)) => {
            let status = match decision.reason {
                Some(DenialReason::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::FORBIDDEN,
            };
            (status, axum::Json(decision)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
