use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{BlacklistType, NewBlacklistEntry};
use super::gatekeeper::{ActionContext, Gatekeeper};
use super::middleware::{require_admin_token, AdminToken, CallerBearer};
use super::registry::{EntryQuery, RegistryError, RegistryTransport, TransportError};

/// Public gatekeeper decision route.
pub fn safety_router<T>(gatekeeper: Arc<Gatekeeper<T>>) -> Router
where
    T: RegistryTransport + 'static,
{
    Router::new()
        .route("/api/v1/safety/evaluate", post(evaluate_handler::<T>))
        .with_state(gatekeeper)
}

/// Administrative routes. Every call needs an `Authorization: Bearer` credential.
///
/// Entry routes forward the caller's credential to the registry, which authorizes
/// the change. Pattern, user-agent and cache routes change in-process state and
/// only admit `admin_token`; they are closed when it is unset.
pub fn admin_router<T>(gatekeeper: Arc<Gatekeeper<T>>, admin_token: AdminToken) -> Router
where
    T: RegistryTransport + 'static,
{
    let local = Router::new()
        .route("/api/v1/safety/cache/clear", post(clear_cache_handler::<T>))
        .route("/api/v1/safety/patterns", post(add_pattern_handler::<T>))
        .route("/api/v1/safety/user-agents", post(add_user_agent_handler::<T>))
        .route_layer(middleware::from_fn_with_state(
            admin_token,
            require_admin_token,
        ));

    Router::new()
        .route(
            "/api/v1/safety/entries",
            post(create_entry_handler::<T>).get(list_entries_handler::<T>),
        )
        .route(
            "/api/v1/safety/entries/:entry_id",
            put(toggle_entry_handler::<T>).delete(delete_entry_handler::<T>),
        )
        .merge(local)
        .with_state(gatekeeper)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntryTypeQuery {
    #[serde(rename = "type")]
    pub(crate) kind: BlacklistType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToggleRequest {
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatternRequest {
    pub(crate) pattern: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserAgentRequest {
    pub(crate) token: String,
}

pub(crate) async fn evaluate_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    headers: HeaderMap,
    Json(context): Json<ActionContext>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    let context = context.or_headers(&headers);
    let decision = gatekeeper.evaluate(&context).await;
    (StatusCode::OK, Json(decision)).into_response()
}

pub(crate) async fn clear_cache_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
) -> StatusCode
where
    T: RegistryTransport + 'static,
{
    gatekeeper.registry().clear_cache();
    StatusCode::NO_CONTENT
}

pub(crate) async fn list_entries_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    CallerBearer(bearer): CallerBearer,
    Query(query): Query<EntryQuery>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    match gatekeeper.registry().list_entries(&query, Some(&bearer)).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn create_entry_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    CallerBearer(bearer): CallerBearer,
    Json(entry): Json<NewBlacklistEntry>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    if entry.value.trim().is_empty() {
        let payload = json!({ "error": "value must not be empty" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    match gatekeeper
        .registry()
        .create_entry(&entry, Some(&bearer))
        .await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn toggle_entry_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    CallerBearer(bearer): CallerBearer,
    Path(entry_id): Path<String>,
    Query(EntryTypeQuery { kind }): Query<EntryTypeQuery>,
    Json(ToggleRequest { is_active }): Json<ToggleRequest>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    match gatekeeper
        .registry()
        .set_entry_active(&entry_id, kind, is_active, Some(&bearer))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn delete_entry_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    CallerBearer(bearer): CallerBearer,
    Path(entry_id): Path<String>,
    Query(EntryTypeQuery { kind }): Query<EntryTypeQuery>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    match gatekeeper
        .registry()
        .delete_entry(&entry_id, kind, Some(&bearer))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn add_pattern_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    Json(PatternRequest { pattern }): Json<PatternRequest>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    match gatekeeper.patterns().add_pattern_str(&pattern) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn add_user_agent_handler<T>(
    State(gatekeeper): State<Arc<Gatekeeper<T>>>,
    Json(UserAgentRequest { token }): Json<UserAgentRequest>,
) -> Response
where
    T: RegistryTransport + 'static,
{
    if token.trim().is_empty() {
        let payload = json!({ "error": "token must not be empty" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    gatekeeper.patterns().add_user_agent(&token);
    StatusCode::NO_CONTENT.into_response()
}

/// Registry refusals of the caller's credential keep their status; anything else is a 502.
fn registry_failure(err: RegistryError) -> Response {
    warn!(error = %err, "registry administration failed");
    let status = match err {
        RegistryError::Transport(TransportError::Status(code @ (401 | 403))) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::FORBIDDEN)
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
