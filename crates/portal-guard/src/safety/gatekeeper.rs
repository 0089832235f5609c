use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client_ip::get_client_ip;
use super::content::ContentValidator;
use super::domain::CheckResult;
use super::patterns::PatternMatcher;
use super::rate_limit::RateLimiter;
use super::registry::{RegistryClient, RegistryTransport};

/// Subjects relevant to one action (lead form, listing inquiry, sign-up).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub free_text_fields: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub rate_limit_key: Option<String>,
}

impl ActionContext {
    /// Client IP and user agent taken from the request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address: get_client_ip(headers),
            user_agent,
            ..Self::default()
        }
    }

    /// Merge request headers into the context.
    ///
    /// A header-derived client IP replaces any `ipAddress` the body claims, so a
    /// caller cannot pick the address that gets checked. The body value is used
    /// only when no forwarding header yields one.
    pub fn or_headers(mut self, headers: &HeaderMap) -> Self {
        let derived = Self::from_headers(headers);
        if derived.ip_address.is_some() {
            self.ip_address = derived.ip_address;
        }
        if self.user_agent.is_none() {
            self.user_agent = derived.user_agent;
        }
        self
    }

    pub fn with_user(mut self, user_id: Option<String>, email: Option<String>) -> Self {
        self.user_id = user_id;
        self.email = email;
        self
    }

    pub fn with_property(mut self, property_id: impl Into<String>) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.free_text_fields.push(text.into());
        self
    }

    pub fn with_rate_limit_key(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    BlockedUserAgent,
    RateLimited,
    IpBlacklisted,
    UserBlacklisted,
    PropertyBlacklisted,
    ContentBlocked,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::BlockedUserAgent => "blocked_user_agent",
            DenialReason::RateLimited => "rate_limited",
            DenialReason::IpBlacklisted => "ip_blacklisted",
            DenialReason::UserBlacklisted => "user_blacklisted",
            DenialReason::PropertyBlacklisted => "property_blacklisted",
            DenialReason::ContentBlocked => "content_blocked",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{allowed, reason?, matchedPattern?}` returned to request handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            matched_pattern: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            matched_pattern: None,
        }
    }

    fn deny_content(pattern: Option<String>) -> Self {
        Self {
            matched_pattern: pattern,
            ..Self::deny(DenialReason::ContentBlocked)
        }
    }
}

/// Combines local pattern checks, rate limiting, registry lookups and content
/// filtering into one decision. Denies only on an explicit positive match.
pub struct Gatekeeper<T> {
    patterns: Arc<PatternMatcher>,
    limiter: Arc<RateLimiter>,
    registry: Arc<RegistryClient<T>>,
    content: ContentValidator<T>,
}

impl<T> Gatekeeper<T>
where
    T: RegistryTransport + 'static,
{
    pub fn new(
        patterns: Arc<PatternMatcher>,
        limiter: Arc<RateLimiter>,
        registry: Arc<RegistryClient<T>>,
    ) -> Self {
        let content = ContentValidator::new(registry.clone());
        Self {
            patterns,
            limiter,
            registry,
            content,
        }
    }

    pub fn patterns(&self) -> &PatternMatcher {
        &self.patterns
    }

    /// Shared pattern lists, for layers that screen requests before routing.
    pub fn patterns_handle(&self) -> Arc<PatternMatcher> {
        self.patterns.clone()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn registry(&self) -> &RegistryClient<T> {
        &self.registry
    }

    pub fn content(&self) -> &ContentValidator<T> {
        &self.content
    }

    pub async fn evaluate(&self, context: &ActionContext) -> GateDecision {
        let decision = self.decide(context).await;
        if let Some(reason) = decision.reason {
            info!(
                %reason,
                ip = context.ip_address.as_deref().unwrap_or("-"),
                user = context.user_id.as_deref().unwrap_or("-"),
                property = context.property_id.as_deref().unwrap_or("-"),
                "action denied"
            );
        }
        decision
    }

    async fn decide(&self, context: &ActionContext) -> GateDecision {
        if let Some(user_agent) = present(&context.user_agent) {
            if self.patterns.is_user_agent_blacklisted(user_agent) {
                return GateDecision::deny(DenialReason::BlockedUserAgent);
            }
        }

        if let Some(key) = present(&context.rate_limit_key) {
            if !self.limiter.is_allowed(key) {
                return GateDecision::deny(DenialReason::RateLimited);
            }
        }

        let user_id = present(&context.user_id);
        let email = present(&context.email);

        // Independent lookups; priority below fixes the reason on simultaneous matches.
        let (ip, user, property) = tokio::join!(
            async {
                match present(&context.ip_address) {
                    Some(ip) => Some(self.registry.check_ip(ip).await),
                    None => None,
                }
            },
            async {
                match (user_id, email) {
                    (None, None) => None,
                    (user_id, email) => Some(
                        self.registry
                            .check_user(user_id.or(email).unwrap_or_default(), email)
                            .await,
                    ),
                }
            },
            async {
                match present(&context.property_id) {
                    Some(property_id) => Some(self.registry.check_property(property_id).await),
                    None => None,
                }
            },
        );

        if blacklisted(&ip) {
            return GateDecision::deny(DenialReason::IpBlacklisted);
        }
        if blacklisted(&user) {
            return GateDecision::deny(DenialReason::UserBlacklisted);
        }
        if blacklisted(&property) {
            return GateDecision::deny(DenialReason::PropertyBlacklisted);
        }

        if !context.free_text_fields.is_empty() {
            let verdict = self.content.validate_all(&context.free_text_fields).await;
            if !verdict.is_valid {
                return GateDecision::deny_content(verdict.blocked_pattern);
            }
        }

        GateDecision::allow()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn blacklisted(result: &Option<CheckResult>) -> bool {
    result.as_ref().is_some_and(|result| result.is_blacklisted)
}
