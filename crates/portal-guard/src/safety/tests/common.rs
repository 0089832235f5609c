use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::leads::{LeadId, LeadRecord, LeadRepository, LeadService, RepositoryError};
use crate::safety::registry::{CheckRequest, RegistryEnvelope};
use crate::safety::{
    BlacklistEntry, BlacklistType, CheckResult, ContentFilter, DecisionCache, EntryQuery,
    Gatekeeper, NewBlacklistEntry, PatternMatcher, RateLimiter, RegistryClient,
    RegistryTransport, TransportError,
};

/// Credential of the operator driving administrative calls in tests.
pub(super) const OPERATOR: &str = "operator-token";

/// How the fake registry answers classification checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Outage {
    None,
    Unreachable,
    Unsuccessful,
}

/// In-memory registry that records every call it receives.
pub(super) struct FakeRegistry {
    blocked: Mutex<HashSet<(BlacklistType, String)>>,
    filters: Mutex<Vec<ContentFilter>>,
    entries: Mutex<HashMap<String, BlacklistEntry>>,
    outage: Mutex<Outage>,
    checks: AtomicUsize,
    filter_loads: AtomicUsize,
    admin_bearers: Mutex<Vec<Option<String>>>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            blocked: Mutex::new(HashSet::new()),
            filters: Mutex::new(Vec::new()),
            entries: Mutex::new(HashMap::new()),
            outage: Mutex::new(Outage::None),
            checks: AtomicUsize::new(0),
            filter_loads: AtomicUsize::new(0),
            admin_bearers: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRegistry {
    pub(super) fn block(&self, kind: BlacklistType, value: &str) {
        self.blocked
            .lock()
            .expect("blocked mutex poisoned")
            .insert((kind, value.to_string()));
    }

    pub(super) fn add_filter(&self, pattern: &str) {
        self.filters
            .lock()
            .expect("filter mutex poisoned")
            .push(ContentFilter::new(pattern));
    }

    pub(super) fn set_outage(&self, outage: Outage) {
        *self.outage.lock().expect("outage mutex poisoned") = outage;
    }

    pub(super) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub(super) fn filter_loads(&self) -> usize {
        self.filter_loads.load(Ordering::SeqCst)
    }

    /// Credential seen on each administrative call, in order.
    pub(super) fn admin_bearers(&self) -> Vec<Option<String>> {
        self.admin_bearers
            .lock()
            .expect("bearer mutex poisoned")
            .clone()
    }

    /// Records the credential and refuses anonymous administration like the registry does.
    fn authorize(&self, bearer: Option<&str>) -> Result<(), TransportError> {
        self.admin_bearers
            .lock()
            .expect("bearer mutex poisoned")
            .push(bearer.map(str::to_string));
        match bearer {
            Some(_) => Ok(()),
            None => Err(TransportError::Status(401)),
        }
    }

    fn outage(&self) -> Outage {
        *self.outage.lock().expect("outage mutex poisoned")
    }

    fn answer<T>(&self, data: T) -> Result<RegistryEnvelope<T>, TransportError> {
        match self.outage() {
            Outage::None => Ok(RegistryEnvelope::ok(data)),
            Outage::Unreachable => Err(TransportError::Status(503)),
            Outage::Unsuccessful => Ok(RegistryEnvelope::failed()),
        }
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn check(
        &self,
        request: &CheckRequest,
    ) -> Result<RegistryEnvelope<CheckResult>, TransportError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let blocked = self.blocked.lock().expect("blocked mutex poisoned");
        let mut hit = blocked.contains(&(request.kind, request.value.clone()));
        if let Some(email) = &request.email {
            hit |= blocked.contains(&(request.kind, email.clone()));
        }
        drop(blocked);

        let result = CheckResult {
            is_blacklisted: hit,
            kind: request.kind,
            reason: hit.then(|| "reported".to_string()),
            matched_pattern: None,
        };
        self.answer(result)
    }

    async fn content_filters(
        &self,
        _query: &EntryQuery,
    ) -> Result<RegistryEnvelope<Vec<ContentFilter>>, TransportError> {
        self.filter_loads.fetch_add(1, Ordering::SeqCst);
        let filters = self.filters.lock().expect("filter mutex poisoned").clone();
        self.answer(filters)
    }

    async fn list_entries(
        &self,
        query: &EntryQuery,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<Vec<BlacklistEntry>>, TransportError> {
        self.authorize(bearer)?;
        let entries = self
            .entries
            .lock()
            .expect("entry mutex poisoned")
            .values()
            .filter(|entry| query.kind.map_or(true, |kind| entry.kind == kind))
            .cloned()
            .collect();
        self.answer(entries)
    }

    async fn create_entry(
        &self,
        entry: &NewBlacklistEntry,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<BlacklistEntry>, TransportError> {
        self.authorize(bearer)?;
        let mut entries = self.entries.lock().expect("entry mutex poisoned");
        let created = BlacklistEntry {
            id: format!("entry-{}", entries.len() + 1),
            kind: entry.kind,
            value: entry.value.clone(),
            reason: entry.reason.clone(),
            is_active: true,
            created_at: Utc::now(),
            expires_at: entry.expires_at,
        };
        entries.insert(created.id.clone(), created.clone());
        drop(entries);

        self.block(entry.kind, &entry.value);
        self.answer(created)
    }

    async fn set_entry_active(
        &self,
        id: &str,
        _kind: BlacklistType,
        is_active: bool,
        bearer: Option<&str>,
    ) -> Result<(), TransportError> {
        self.authorize(bearer)?;
        let mut entries = self.entries.lock().expect("entry mutex poisoned");
        let entry = entries.get_mut(id).ok_or(TransportError::Status(404))?;
        entry.is_active = is_active;

        let key = (entry.kind, entry.value.clone());
        drop(entries);
        let mut blocked = self.blocked.lock().expect("blocked mutex poisoned");
        if is_active {
            blocked.insert(key);
        } else {
            blocked.remove(&key);
        }
        Ok(())
    }

    async fn delete_entry(
        &self,
        id: &str,
        _kind: BlacklistType,
        bearer: Option<&str>,
    ) -> Result<(), TransportError> {
        self.authorize(bearer)?;
        let removed = self
            .entries
            .lock()
            .expect("entry mutex poisoned")
            .remove(id)
            .ok_or(TransportError::Status(404))?;
        self.blocked
            .lock()
            .expect("blocked mutex poisoned")
            .remove(&(removed.kind, removed.value));
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) registry: Arc<FakeRegistry>,
    pub(super) gatekeeper: Arc<Gatekeeper<FakeRegistry>>,
}

pub(super) fn harness() -> Harness {
    harness_with_limit(5)
}

pub(super) fn harness_with_limit(max_attempts: usize) -> Harness {
    let registry = Arc::new(FakeRegistry::default());
    let client = RegistryClient::new(registry.clone(), Arc::new(DecisionCache::default()));
    let gatekeeper = Gatekeeper::new(
        Arc::new(PatternMatcher::with_defaults()),
        Arc::new(RateLimiter::new(max_attempts, Duration::from_secs(60))),
        Arc::new(client),
    );
    Harness {
        registry,
        gatekeeper: Arc::new(gatekeeper),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryLeads {
    pub(super) records: Arc<Mutex<HashMap<LeadId, LeadRecord>>>,
}

impl LeadRepository for MemoryLeads {
    fn insert(&self, record: LeadRecord) -> Result<LeadRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.lead_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.lead_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(super) struct UnavailableLeads;

impl LeadRepository for UnavailableLeads {
    fn insert(&self, _record: LeadRecord) -> Result<LeadRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn lead_service(
    harness: &Harness,
) -> (Arc<LeadService<MemoryLeads, FakeRegistry>>, Arc<MemoryLeads>) {
    let repository = Arc::new(MemoryLeads::default());
    let service = LeadService::new(repository.clone(), harness.gatekeeper.clone());
    (Arc::new(service), repository)
}

pub(super) fn submission() -> crate::leads::LeadSubmission {
    crate::leads::LeadSubmission {
        name: "Dana Fields".to_string(),
        email: "dana@example.com".to_string(),
        phone: Some("515-555-0100".to_string()),
        message: "Is the two bedroom on Grand still available?".to_string(),
        property_id: Some("prop-12".to_string()),
        user_id: None,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
