//! Trust and safety gatekeeping: bot and domain blacklists, rate limiting,
//! registry-backed subject checks and content filtering.
//!
//! Every remote failure fails open. A request is only denied when a check
//! reports an explicit positive match.

pub mod cache;
pub mod client_ip;
pub mod content;
pub mod domain;
pub mod gatekeeper;
pub mod middleware;
pub mod patterns;
pub mod rate_limit;
pub mod registry;
pub mod router;

#[cfg(test)]
mod tests;

pub use cache::{cache_key, DecisionCache, DEFAULT_FRESHNESS};
pub use client_ip::get_client_ip;
pub use content::ContentValidator;
pub use domain::{
    BlacklistEntry, BlacklistType, CheckResult, ContentFilter, ContentVerdict, NewBlacklistEntry,
};
pub use gatekeeper::{ActionContext, DenialReason, GateDecision, Gatekeeper};
pub use middleware::{require_admin_token, user_agent_guard, AdminToken, CallerBearer};
pub use patterns::{PatternError, PatternMatcher};
pub use rate_limit::RateLimiter;
pub use registry::{
    EntryQuery, HttpRegistryTransport, RegistryClient, RegistryError, RegistryTransport,
    TransportError,
};
pub use router::{admin_router, safety_router};
