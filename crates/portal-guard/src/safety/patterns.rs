//! Local, zero-I/O classification of user agents and URLs.

use std::sync::{PoisonError, RwLock};

use regex::{Regex, RegexBuilder};
use reqwest::Url;

/// Hosting-platform crawlers and preview bots that must not index or submit to the portal.
const DEFAULT_USER_AGENT_TOKENS: &[&str] = &[
    "vercel",
    "vercelbot",
    "nextjs",
    "next.js",
    "v0.dev",
    "v0bot",
];

const DEFAULT_USER_AGENT_PATTERNS: &[&str] =
    &[r"vercel[-_ ]?(bot|screenshot|preview)", r"next[-.]?js"];

const DEFAULT_DOMAIN_TOKENS: &[&str] = &["vercel.com", "vercel.app", "nextjs.org", "v0.dev"];

/// Error raised when a custom pattern does not compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Blocked user-agent tokens, regex patterns and domain tokens.
///
/// Lists are read on every request and mutated only by administrative calls,
/// so they sit behind read-mostly locks.
#[derive(Debug)]
pub struct PatternMatcher {
    user_agents: RwLock<Vec<String>>,
    patterns: RwLock<Vec<Regex>>,
    domains: RwLock<Vec<String>>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternMatcher {
    /// Matcher with no blocked entries at all.
    pub fn empty() -> Self {
        Self {
            user_agents: RwLock::new(Vec::new()),
            patterns: RwLock::new(Vec::new()),
            domains: RwLock::new(Vec::new()),
        }
    }

    /// Matcher seeded with the built-in platform bot lists.
    pub fn with_defaults() -> Self {
        let matcher = Self::empty();
        for token in DEFAULT_USER_AGENT_TOKENS {
            matcher.add_user_agent(token);
        }
        for pattern in DEFAULT_USER_AGENT_PATTERNS {
            if let Ok(regex) = case_insensitive(pattern) {
                matcher.add_pattern(regex);
            }
        }
        for domain in DEFAULT_DOMAIN_TOKENS {
            matcher.add_domain(domain);
        }
        matcher
    }

    pub fn is_user_agent_blacklisted(&self, user_agent: &str) -> bool {
        let user_agent = user_agent.trim();
        if user_agent.is_empty() {
            return false;
        }

        let lowered = user_agent.to_lowercase();
        let token_hit = self
            .user_agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|token| lowered.contains(token.as_str()));
        if token_hit {
            return true;
        }

        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|pattern| pattern.is_match(user_agent))
    }

    /// Inspect the hostname of `url`; unparseable input falls back to a raw substring search.
    pub fn is_domain_blacklisted(&self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() {
            return false;
        }

        let haystack = match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.to_lowercase(),
                None => url.to_lowercase(),
            },
            Err(_) => url.to_lowercase(),
        };

        self.domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|token| haystack.contains(token.as_str()))
    }

    /// Append a regex matched against raw user agents. No deduplication.
    pub fn add_pattern(&self, pattern: Regex) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern);
    }

    /// Compile `pattern` case-insensitively and append it.
    pub fn add_pattern_str(&self, pattern: &str) -> Result<(), PatternError> {
        let regex = case_insensitive(pattern).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source,
        })?;
        self.add_pattern(regex);
        Ok(())
    }

    /// Append a literal user-agent token. Returns `false` when it was already present.
    pub fn add_user_agent(&self, token: &str) -> bool {
        push_unique(&self.user_agents, token)
    }

    /// Append a blocked domain token. Returns `false` when it was already present.
    pub fn add_domain(&self, token: &str) -> bool {
        push_unique(&self.domains, token)
    }

    pub fn user_agent_tokens(&self) -> Vec<String> {
        self.user_agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn push_unique(list: &RwLock<Vec<String>>, token: &str) -> bool {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return false;
    }

    let mut guard = list.write().unwrap_or_else(PoisonError::into_inner);
    if guard.iter().any(|existing| *existing == token) {
        return false;
    }
    guard.push(token);
    true
}
