use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::safety::domain::{
    BlacklistEntry, BlacklistType, CheckResult, ContentFilter, NewBlacklistEntry,
};

/// Body of `POST /api/blacklist/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRequest {
    #[serde(rename = "type")]
    pub kind: BlacklistType,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `{success, data?}` envelope wrapping every registry response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

impl<T> RegistryEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            data: None,
        }
    }

    /// The payload when the registry reported success and included data.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

/// Filters for `GET /api/blacklist`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlacklistType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl EntryQuery {
    /// Active content filters, as consumed by content validation.
    pub fn active_content(limit: u32) -> Self {
        Self {
            kind: Some(BlacklistType::Content),
            is_active: Some(true),
            limit: Some(limit),
        }
    }

    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(kind) = self.kind {
            pairs.push(("type", kind.to_string()));
        }
        if let Some(is_active) = self.is_active {
            pairs.push(("isActive", is_active.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Transport-level failure talking to the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("registry responded with status {0}")]
    Status(u16),
    #[error("registry request timed out")]
    Timeout,
    #[error("registry unreachable: {0}")]
    Request(String),
    #[error("registry response could not be decoded: {0}")]
    Decode(String),
}

/// Network boundary to the blacklist registry.
///
/// Classification reads run under the service credential. Administrative calls
/// carry only the bearer credential of the caller on whose behalf they are made.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn check(
        &self,
        request: &CheckRequest,
    ) -> Result<RegistryEnvelope<CheckResult>, TransportError>;

    async fn content_filters(
        &self,
        query: &EntryQuery,
    ) -> Result<RegistryEnvelope<Vec<ContentFilter>>, TransportError>;

    async fn list_entries(
        &self,
        query: &EntryQuery,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<Vec<BlacklistEntry>>, TransportError>;

    async fn create_entry(
        &self,
        entry: &NewBlacklistEntry,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<BlacklistEntry>, TransportError>;

    async fn set_entry_active(
        &self,
        id: &str,
        kind: BlacklistType,
        is_active: bool,
        bearer: Option<&str>,
    ) -> Result<(), TransportError>;

    async fn delete_entry(
        &self,
        id: &str,
        kind: BlacklistType,
        bearer: Option<&str>,
    ) -> Result<(), TransportError>;
}
