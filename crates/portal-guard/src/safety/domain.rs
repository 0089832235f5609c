use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of subject a blacklist entry or classification query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistType {
    User,
    Property,
    Ip,
    EmailDomain,
    Content,
}

impl BlacklistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistType::User => "user",
            BlacklistType::Property => "property",
            BlacklistType::Ip => "ip",
            BlacklistType::EmailDomain => "email_domain",
            BlacklistType::Content => "content",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "property" => Some(Self::Property),
            "ip" => Some(Self::Ip),
            "email_domain" | "email-domain" => Some(Self::EmailDomain),
            "content" => Some(Self::Content),
            _ => None,
        }
    }
}

impl fmt::Display for BlacklistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One blocked subject as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlacklistType,
    pub value: String,
    #[serde(default)]
    pub reason: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BlacklistEntry {
    /// Active and not past `expires_at`. The registry flag alone is not trusted for expiry.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Payload for creating a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlacklistEntry {
    #[serde(rename = "type")]
    pub kind: BlacklistType,
    pub value: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a single classification query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub is_blacklisted: bool,
    #[serde(rename = "type")]
    pub kind: BlacklistType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

impl CheckResult {
    /// The fail-open default: not blacklisted.
    pub fn clear(kind: BlacklistType) -> Self {
        Self {
            is_blacklisted: false,
            kind,
            reason: None,
            matched_pattern: None,
        }
    }
}

/// Content filter row returned by the registry listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFilter {
    pub pattern: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl ContentFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_active: true,
            expires_at: None,
        }
    }

    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && !self.pattern.trim().is_empty()
            && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Result of scanning free text against the content filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentVerdict {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_pattern: Option<String>,
}

impl ContentVerdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            blocked_pattern: None,
        }
    }

    pub fn blocked(pattern: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            blocked_pattern: Some(pattern.into()),
        }
    }
}
