//! Per-caller cooldown for the chat endpoint
//!
//! One completion per caller per cooldown window. Keys are opaque caller
//! identifiers (the bearer token, or a shared anonymous bucket); state is a
//! lock-free map so the limiter can sit in shared axum state.

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    cooldown: Duration,
    last_call: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: DashMap::new(),
        }
    }

    /// Record a call for `key`, or reject it with `Error::RateLimited`
    /// carrying the whole seconds left in the window (minimum 1).
    pub fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();
        // Stale entries are dropped on the way in, bounding the map to the
        // keys seen within one cooldown window
        self.last_call
            .retain(|_, last| now.duration_since(*last) < self.cooldown);
        match self.last_call.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.duration_since(*entry.get());
                if elapsed < self.cooldown {
                    let wait = (self.cooldown - elapsed).as_secs().max(1);
                    return Err(Error::RateLimited(wait));
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }
}
