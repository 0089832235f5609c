//! In-process sliding-window limiter keyed by actor (IP, form, user).
//!
//! State is not shared across processes; horizontally scaled deployments
//! under-count attempts. Keys whose attempts have all aged out are swept at most
//! once per window, so memory tracks recently active keys only.

use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: DashMap<String, Vec<Instant>>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an attempt for `key` unless the window is already full.
    ///
    /// Denied attempts are not recorded. The prune-count-append sequence runs
    /// while holding the key's shard lock.
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = Instant::now();
        self.sweep_if_due(now);

        let mut window = self.attempts.entry(key.to_string()).or_default();
        prune(&mut window, now, self.window);

        if window.len() >= self.max_attempts {
            debug!(key, attempts = window.len(), "rate limit reached");
            return false;
        }

        window.push(now);
        true
    }

    /// Attempts still available for `key` in the current window.
    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let used = match self.attempts.get_mut(key) {
            Some(mut window) => {
                prune(&mut window, now, self.window);
                window.len()
            }
            None => return self.max_attempts,
        };

        if used == 0 {
            self.attempts.remove_if(key, |_, window| window.is_empty());
        }
        self.max_attempts.saturating_sub(used)
    }

    pub fn reset(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Keys currently holding attempt history.
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }

    /// Drop every key whose attempts have all aged out.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let span = self.window;
        let before = self.attempts.len();
        self.attempts.retain(|_, window| {
            prune(window, now, span);
            !window.is_empty()
        });
        debug!(
            removed = before.saturating_sub(self.attempts.len()),
            "expired rate limit keys purged"
        );
    }

    /// Runs before any shard entry is held; `retain` locks every shard.
    fn sweep_if_due(&self, now: Instant) {
        let mut last_sweep = match self.last_sweep.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if now.saturating_duration_since(*last_sweep) < self.window {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);
        self.purge_expired();
    }
}

fn prune(window: &mut Vec<Instant>, now: Instant, span: Duration) {
    window.retain(|attempt| now.saturating_duration_since(*attempt) < span);
}
