use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::leads::lead_router;
use crate::safety::{
    admin_router, safety_router, user_agent_guard, AdminToken, BlacklistType, PatternMatcher,
};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "Mozilla/5.0 (Windows NT 10.0)")
        .header("x-real-ip", "192.0.2.44")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request")
}

#[tokio::test]
async fn evaluate_route_derives_ip_from_headers() {
    let harness = harness();
    harness.registry.block(BlacklistType::Ip, "192.0.2.44");
    let router = safety_router(harness.gatekeeper.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/evaluate",
            json!({ "propertyId": "prop-3" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "allowed": false, "reason": "ip_blacklisted" }));
}

#[tokio::test]
async fn evaluate_route_allows_clean_actions() {
    let harness = harness();
    let router = safety_router(harness.gatekeeper.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/evaluate",
            json!({ "userId": "user-3", "freeTextFields": ["hello"] }),
        ))
        .await
        .expect("response");

    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "allowed": true }));
}

const LOCAL_ADMIN: &str = "local-admin-token";

fn admin(harness: &Harness) -> Router {
    admin_router(
        harness.gatekeeper.clone(),
        AdminToken::new(Some(LOCAL_ADMIN.to_string())),
    )
}

fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("header value");
    request.headers_mut().insert(header::AUTHORIZATION, value);
    request
}

fn bare_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn evaluate_route_prefers_the_header_ip_over_the_body() {
    let harness = harness();
    harness.registry.block(BlacklistType::Ip, "192.0.2.44");
    let router = safety_router(harness.gatekeeper.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/evaluate",
            json!({ "ipAddress": "198.51.100.200" }),
        ))
        .await
        .expect("response");

    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "allowed": false, "reason": "ip_blacklisted" }));
    assert_eq!(harness.registry.checks(), 1);
}

#[tokio::test]
async fn evaluate_route_uses_the_body_ip_without_forwarding_headers() {
    let harness = harness();
    harness.registry.block(BlacklistType::Ip, "198.51.100.200");
    let router = safety_router(harness.gatekeeper.clone());

    let response = router
        .oneshot(
            Request::post("/api/v1/safety/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "ipAddress": "198.51.100.200" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    let body = read_json_body(response).await;
    assert_eq!(body["reason"], "ip_blacklisted");
}

#[tokio::test]
async fn public_router_exposes_no_administration() {
    let harness = harness();
    let router = safety_router(harness.gatekeeper.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/user-agents",
            json!({ "token": "mozilla" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_admin_calls_never_reach_the_registry() {
    let harness = harness();
    let router = admin(&harness);

    let created = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/entries",
            json!({ "type": "ip", "value": "192.0.2.44" }),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::UNAUTHORIZED);

    let deleted = router
        .clone()
        .oneshot(bare_request("DELETE", "/api/v1/safety/entries/entry-1?type=ip"))
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.registry.admin_bearers().is_empty());

    let token = router
        .oneshot(json_request(
            "POST",
            "/api/v1/safety/user-agents",
            json!({ "token": "mozilla" }),
        ))
        .await
        .expect("response");
    assert_eq!(token.status(), StatusCode::UNAUTHORIZED);

    let browser = safety_router(harness.gatekeeper.clone())
        .oneshot(json_request("POST", "/api/v1/safety/evaluate", json!({})))
        .await
        .expect("response");
    assert_eq!(read_json_body(browser).await, json!({ "allowed": true }));
}

#[tokio::test]
async fn entry_routes_manage_the_registry_with_the_callers_credential() {
    let harness = harness();
    let router = admin(&harness);

    let created = router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/entries",
                json!({ "type": "ip", "value": "192.0.2.44", "reason": "card testing" }),
            ),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let entry = read_json_body(created).await;
    let entry_id = entry["id"].as_str().expect("id").to_string();
    assert_eq!(entry["type"], "ip");

    let listed = router
        .clone()
        .oneshot(with_bearer(
            bare_request("GET", "/api/v1/safety/entries?type=ip"),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let entries = read_json_body(listed).await;
    assert_eq!(entries.as_array().map(Vec::len), Some(1));

    let toggled = router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "PUT",
                &format!("/api/v1/safety/entries/{entry_id}?type=ip"),
                json!({ "isActive": false }),
            ),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(toggled.status(), StatusCode::NO_CONTENT);

    let deleted = router
        .oneshot(with_bearer(
            bare_request("DELETE", &format!("/api/v1/safety/entries/{entry_id}?type=ip")),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        harness.registry.admin_bearers(),
        vec![Some(OPERATOR.to_string()); 4]
    );
}

#[tokio::test]
async fn entry_routes_validate_and_report_registry_failures() {
    let harness = harness();
    let router = admin(&harness);

    let empty = router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/entries",
                json!({ "type": "user", "value": "  " }),
            ),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

    harness.registry.set_outage(Outage::Unreachable);
    let failed = router
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/entries",
                json!({ "type": "user", "value": "user-5" }),
            ),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn pattern_routes_extend_the_matcher() {
    let harness = harness();
    let router = admin(&harness);

    let added = router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/patterns",
                json!({ "pattern": "headless-?chrome" }),
            ),
            LOCAL_ADMIN,
        ))
        .await
        .expect("response");
    assert_eq!(added.status(), StatusCode::NO_CONTENT);
    assert!(harness
        .gatekeeper
        .patterns()
        .is_user_agent_blacklisted("Mozilla/5.0 HeadlessChrome/120"));

    let invalid = router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/patterns",
                json!({ "pattern": "(unclosed" }),
            ),
            LOCAL_ADMIN,
        ))
        .await
        .expect("response");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let token = router
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/user-agents",
                json!({ "token": "ScraperBot" }),
            ),
            LOCAL_ADMIN,
        ))
        .await
        .expect("response");
    assert_eq!(token.status(), StatusCode::NO_CONTENT);
    assert!(harness
        .gatekeeper
        .patterns()
        .is_user_agent_blacklisted("scraperbot/2.1"));
}

#[tokio::test]
async fn local_admin_routes_require_the_configured_token() {
    let harness = harness();

    let wrong = admin(&harness)
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/api/v1/safety/user-agents",
                json!({ "token": "mozilla" }),
            ),
            OPERATOR,
        ))
        .await
        .expect("response");
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let closed = admin_router(harness.gatekeeper.clone(), AdminToken::new(None))
        .oneshot(with_bearer(
            bare_request("POST", "/api/v1/safety/cache/clear"),
            LOCAL_ADMIN,
        ))
        .await
        .expect("response");
    assert_eq!(closed.status(), StatusCode::FORBIDDEN);

    assert!(!harness
        .gatekeeper
        .patterns()
        .is_user_agent_blacklisted("Mozilla/5.0 (Windows NT 10.0)"));
}

#[tokio::test]
async fn cache_clear_route_returns_no_content() {
    let harness = harness();
    let router = admin(&harness);
    harness.gatekeeper.registry().check_ip("192.0.2.44").await;

    let response = router
        .oneshot(with_bearer(
            bare_request("POST", "/api/v1/safety/cache/clear"),
            LOCAL_ADMIN,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    harness.gatekeeper.registry().check_ip("192.0.2.44").await;
    assert_eq!(harness.registry.checks(), 2);
}

#[tokio::test]
async fn lead_route_accepts_clean_submissions() {
    let harness = harness();
    let (service, _) = lead_service(&harness);
    let router = lead_router(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/leads",
            serde_json::to_value(submission()).expect("serialize"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json_body(response).await;
    assert!(body["lead_id"].as_str().is_some());
}

#[tokio::test]
async fn lead_route_rejects_blocked_content() {
    let harness = harness();
    harness.registry.add_filter("gift card");
    let (service, _) = lead_service(&harness);
    let router = lead_router(service);
    let mut submission = submission();
    submission.message = "I will pay the deposit in gift cards".to_string();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/leads",
            serde_json::to_value(submission).expect("serialize"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(response).await;
    assert_eq!(
        body,
        json!({ "allowed": false, "reason": "content_blocked", "matchedPattern": "gift card" })
    );
}

#[tokio::test]
async fn lead_route_throttles_repeat_submissions() {
    let harness = harness_with_limit(1);
    let (service, _) = lead_service(&harness);
    let router = lead_router(service);
    let payload = serde_json::to_value(submission()).expect("serialize");

    let first = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/leads", payload.clone()))
        .await
        .expect("response");
    let second = router
        .oneshot(json_request("POST", "/api/v1/leads", payload))
        .await
        .expect("response");

    assert_eq!(first.status(), StatusCode::ACCEPTED);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn lead_route_requires_an_email() {
    let harness = harness();
    let (service, _) = lead_service(&harness);
    let mut submission = submission();
    submission.email = String::new();

    let response = lead_router(service)
        .oneshot(json_request(
            "POST",
            "/api/v1/leads",
            serde_json::to_value(submission).expect("serialize"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

fn guarded_router() -> Router {
    let patterns = Arc::new(PatternMatcher::with_defaults());
    Router::new()
        .route("/listings", get(|| async { "listings" }))
        .layer(axum::middleware::from_fn_with_state(
            patterns,
            user_agent_guard,
        ))
}

#[tokio::test]
async fn user_agent_guard_blocks_known_bots() {
    let response = guarded_router()
        .oneshot(
            Request::get("/listings")
                .header(header::USER_AGENT, "v0bot/1.0 (+https://v0.dev)")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(response).await;
    assert_eq!(body["reason"], "blocked_user_agent");
}

#[tokio::test]
async fn user_agent_guard_passes_browsers_and_missing_agents() {
    for agent in [Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"), None] {
        let mut request = Request::get("/listings");
        if let Some(agent) = agent {
            request = request.header(header::USER_AGENT, agent);
        }

        let response = guarded_router()
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
