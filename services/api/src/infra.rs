use metrics_exporter_prometheus::PrometheusHandle;
use portal_guard::config::AppConfig;
use portal_guard::error::AppError;
use portal_guard::leads::{LeadId, LeadRecord, LeadRepository, RepositoryError};
use portal_guard::safety::{
    DecisionCache, Gatekeeper, HttpRegistryTransport, PatternMatcher, RateLimiter,
    RegistryClient,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub(crate) type PortalGatekeeper = Gatekeeper<HttpRegistryTransport>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    records: Arc<Mutex<HashMap<LeadId, LeadRecord>>>,
}

impl LeadRepository for InMemoryLeadRepository {
    fn insert(&self, record: LeadRecord) -> Result<LeadRecord, RepositoryError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&record.lead_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.lead_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }
}

/// Pattern lists with the configured extra tokens applied on top of the defaults.
pub(crate) fn pattern_matcher(config: &AppConfig) -> PatternMatcher {
    let patterns = PatternMatcher::with_defaults();
    for token in &config.patterns.extra_user_agents {
        if patterns.add_user_agent(token) {
            debug!(token = %token, "blocked user agent token added");
        }
    }
    for token in &config.patterns.extra_domains {
        if patterns.add_domain(token) {
            debug!(token = %token, "blocked domain token added");
        }
    }
    patterns
}

pub(crate) fn registry_client(
    config: &AppConfig,
) -> Result<RegistryClient<HttpRegistryTransport>, AppError> {
    let transport = HttpRegistryTransport::new(&config.registry)?;
    let cache = DecisionCache::new(config.registry.cache_freshness);
    Ok(RegistryClient::new(Arc::new(transport), Arc::new(cache))
        .with_cache_enabled(config.registry.use_cache))
}

/// The single gatekeeper instance shared by every route.
pub(crate) fn build_gatekeeper(config: &AppConfig) -> Result<Arc<PortalGatekeeper>, AppError> {
    let patterns = Arc::new(pattern_matcher(config));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_attempts,
        config.rate_limit.window,
    ));
    let registry = Arc::new(registry_client(config)?);
    Ok(Arc::new(Gatekeeper::new(patterns, limiter, registry)))
}
