use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::domain::{BlacklistType, CheckResult};

/// Freshness window applied when configuration does not override it.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CheckResult,
    stored_at: Instant,
}

/// Memoizes registry decisions per subject. Stale entries are ignored on read
/// and overwritten by the next `set`; nothing evicts them in the background.
#[derive(Debug)]
pub struct DecisionCache {
    freshness: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS)
    }
}

impl DecisionCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<CheckResult> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.freshness {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub fn set(&self, key: String, result: CheckResult) {
        self.entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `"<type>:<primary>:<secondary-or-empty>"`.
pub fn cache_key(kind: BlacklistType, primary: &str, secondary: Option<&str>) -> String {
    format!("{}:{}:{}", kind, primary, secondary.unwrap_or_default())
}
