use std::sync::Arc;

use tracing::{debug, warn};

use super::transport::{
    CheckRequest, EntryQuery, RegistryEnvelope, RegistryTransport, TransportError,
};
use crate::safety::cache::{cache_key, DecisionCache};
use crate::safety::domain::{
    BlacklistEntry, BlacklistType, CheckResult, ContentFilter, NewBlacklistEntry,
};

/// Page size used when pulling the active content filters.
pub const CONTENT_FILTER_LIMIT: u32 = 100;

/// Administrative registry failure. Classification checks never surface these.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("registry rejected the request")]
    Rejected,
}

/// Classification queries against the registry with caching and fail-open handling.
pub struct RegistryClient<T> {
    transport: Arc<T>,
    cache: Arc<DecisionCache>,
    use_cache: bool,
}

impl<T> RegistryClient<T>
where
    T: RegistryTransport + 'static,
{
    pub fn new(transport: Arc<T>, cache: Arc<DecisionCache>) -> Self {
        Self {
            transport,
            cache,
            use_cache: true,
        }
    }

    /// Enable or bypass the decision cache for reads and writes.
    pub fn with_cache_enabled(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub async fn check_user(&self, user_id: &str, email: Option<&str>) -> CheckResult {
        let request = CheckRequest {
            kind: BlacklistType::User,
            value: user_id.to_string(),
            email: email.map(str::to_string),
        };
        let key = cache_key(BlacklistType::User, user_id, email);
        self.classify(key, request).await
    }

    pub async fn check_property(&self, property_id: &str) -> CheckResult {
        let request = CheckRequest {
            kind: BlacklistType::Property,
            value: property_id.to_string(),
            email: None,
        };
        let key = cache_key(BlacklistType::Property, property_id, None);
        self.classify(key, request).await
    }

    pub async fn check_ip(&self, ip: &str) -> CheckResult {
        let request = CheckRequest {
            kind: BlacklistType::Ip,
            value: ip.to_string(),
            email: None,
        };
        let key = cache_key(BlacklistType::Ip, ip, None);
        self.classify(key, request).await
    }

    async fn classify(&self, key: String, request: CheckRequest) -> CheckResult {
        if self.use_cache {
            if let Some(cached) = self.cache.get(&key) {
                debug!(%key, "registry decision served from cache");
                return cached;
            }
        }

        let kind = request.kind;
        let response = self.transport.check(&request).await;
        let Some(mut result) = fail_open(kind, response) else {
            return CheckResult::clear(kind);
        };

        result.kind = kind;
        if self.use_cache {
            self.cache.set(key, result.clone());
        }
        result
    }

    /// Active content filters. Errors are returned so the caller owns the fail-open choice.
    pub async fn content_filters(&self) -> Result<Vec<ContentFilter>, RegistryError> {
        let envelope = self
            .transport
            .content_filters(&EntryQuery::active_content(CONTENT_FILTER_LIMIT))
            .await?;
        envelope.into_data().ok_or(RegistryError::Rejected)
    }

    /// Administrative calls below forward `bearer`, the credential of the
    /// caller they are made for. The registry decides whether it is allowed.
    pub async fn list_entries(
        &self,
        query: &EntryQuery,
        bearer: Option<&str>,
    ) -> Result<Vec<BlacklistEntry>, RegistryError> {
        let envelope = self.transport.list_entries(query, bearer).await?;
        envelope.into_data().ok_or(RegistryError::Rejected)
    }

    pub async fn create_entry(
        &self,
        entry: &NewBlacklistEntry,
        bearer: Option<&str>,
    ) -> Result<BlacklistEntry, RegistryError> {
        let envelope = self.transport.create_entry(entry, bearer).await?;
        let created = envelope.into_data().ok_or(RegistryError::Rejected)?;
        self.clear_cache();
        Ok(created)
    }

    pub async fn set_entry_active(
        &self,
        id: &str,
        kind: BlacklistType,
        is_active: bool,
        bearer: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.transport
            .set_entry_active(id, kind, is_active, bearer)
            .await?;
        self.clear_cache();
        Ok(())
    }

    pub async fn delete_entry(
        &self,
        id: &str,
        kind: BlacklistType,
        bearer: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.transport.delete_entry(id, kind, bearer).await?;
        self.clear_cache();
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// The single place where registry failures turn into "not blacklisted".
fn fail_open(
    kind: BlacklistType,
    response: Result<RegistryEnvelope<CheckResult>, TransportError>,
) -> Option<CheckResult> {
    match response {
        Ok(envelope) => {
            let data = envelope.into_data();
            if data.is_none() {
                warn!(check = %kind, "registry returned no decision; allowing");
            }
            data
        }
        Err(err) => {
            warn!(check = %kind, error = %err, "registry check failed; allowing");
            None
        }
    }
}
