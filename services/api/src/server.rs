use crate::cli::ServeArgs;
use crate::infra::{build_gatekeeper, AppState, InMemoryLeadRepository};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use portal_guard::config::AppConfig;
use portal_guard::error::AppError;
use portal_guard::leads::LeadService;
use portal_guard::safety::{user_agent_guard, AdminToken};
use portal_guard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let gatekeeper = build_gatekeeper(&config)?;
    let patterns = gatekeeper.patterns_handle();
    let leads = Arc::new(LeadService::new(
        Arc::new(InMemoryLeadRepository::default()),
        gatekeeper.clone(),
    ));

    if config.admin.token.is_none() {
        warn!("ADMIN_API_TOKEN unset; pattern and cache administration is disabled");
    }
    let admin_token = AdminToken::new(config.admin.token.clone());

    let app = with_portal_routes(gatekeeper, leads, admin_token)
        .layer(axum::middleware::from_fn_with_state(patterns, user_agent_guard))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        registry = %config.registry.base_url,
        "portal guard ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
