//! services/api/src/web/ratelimit.rs
//!
//! Fixed-window, per-address rate limiting with in-memory storage for the
//! download endpoint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// Opportunistic cleanup threshold; keeps the map bounded without a sweeper task.
const CLEANUP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// In-memory rate limiter using a fixed-window algorithm.
///
/// Thread-safe via `Mutex<HashMap>`. State is process-local and advisory:
/// under horizontal scaling each instance counts independently, which is an
/// accepted limitation for abuse mitigation.
pub struct FixedWindowLimiter {
    window: Duration,
    max: u32,
    store: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request for `key` and reports whether it is allowed.
    ///
    /// A fresh or expired window starts over at count 1; within a live window
    /// the request is rejected once `max` has been reached.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if store.len() > CLEANUP_THRESHOLD {
            store.retain(|_, entry| entry.reset_at > now);
        }

        match store.get_mut(key) {
            Some(entry) if now < entry.reset_at => {
                if entry.count >= self.max {
                    return false;
                }
                entry.count += 1;
                true
            }
            _ => {
                store.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}
