use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use super::gatekeeper::{DenialReason, GateDecision};
use super::patterns::PatternMatcher;

/// Rejects requests from blacklisted user agents before they reach any route.
///
/// Install with `axum::middleware::from_fn_with_state(patterns, user_agent_guard)`.
pub async fn user_agent_guard(
    State(patterns): State<Arc<PatternMatcher>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if patterns.is_user_agent_blacklisted(user_agent) {
        info!(user_agent, path = %request.uri().path(), "blocked user agent");
        let decision = GateDecision::deny(DenialReason::BlockedUserAgent);
        return (StatusCode::FORBIDDEN, Json(decision)).into_response();
    }

    next.run(request).await
}

/// Bearer credential presented by the caller in `Authorization`.
///
/// Extraction fails with `401` when the header is missing or not a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerBearer(pub String);

impl CallerBearer {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = raw.trim().split_once(' ')?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return None;
        }
        Some(Self(token.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerBearer
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or_else(|| {
            let payload = json!({ "error": "bearer credential required" });
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(payload),
            )
                .into_response()
        })
    }
}

/// Operator token guarding administration of in-process state. `None` closes those routes.
#[derive(Debug, Clone, Default)]
pub struct AdminToken(Option<Arc<str>>);

impl AdminToken {
    pub fn new(token: Option<String>) -> Self {
        Self(
            token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
                .map(Arc::from),
        )
    }
}

/// Admits requests whose bearer credential equals the configured [`AdminToken`].
pub async fn require_admin_token(
    State(expected): State<AdminToken>,
    CallerBearer(presented): CallerBearer,
    request: Request<Body>,
    next: Next,
) -> Response {
    let error = match expected.0.as_deref() {
        Some(token) if token == presented => return next.run(request).await,
        Some(_) => "admin credential rejected",
        None => "local administration is disabled",
    };

    warn!(path = %request.uri().path(), error, "administrative request refused");
    let payload = json!({ "error": error });
    (StatusCode::FORBIDDEN, Json(payload)).into_response()
}
