//! Fixed-window request throttling keyed by client address.

use axum::http::HeaderMap;
use hashbrown::HashMap;
use parking_lot::Mutex;
use sandgate_config::RateLimitConfig;
use sandgate_config::constants::defaults;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Key used when no client address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

const MAX_WINDOW: Duration = Duration::from_secs(defaults::MAX_RATE_WINDOW_SECS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Throttled,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// At most `max_requests` per client per window. The window starts with a
/// client's first request and is replaced once `reset_at` has passed.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    entries: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// `window` is clamped to one day.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window: window.min(MAX_WINDOW),
            max_requests,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    pub fn admit(&self, key: &str) -> Admission {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &str, now: Instant) -> Admission {
        let fresh = Window {
            count: 0,
            reset_at: now + self.window,
        };
        let mut entries = self.entries.lock();
        let entry = entries.entry_ref(key).or_insert(fresh);
        if now > entry.reset_at {
            *entry = fresh;
        }
        entry.count = entry.count.saturating_add(1);
        if entry.count > self.max_requests {
            Admission::Throttled
        } else {
            Admission::Allowed
        }
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every `interval` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep_at(Instant::now());
                if removed > 0 {
                    debug!(removed, remaining = limiter.len(), "swept rate limit entries");
                }
            }
        })
    }
}

/// The key a request is counted under.
///
/// With `trust_forwarded_for` the first `X-Forwarded-For` hop wins; otherwise
/// the peer address, falling back to [`UNKNOWN_CLIENT`].
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
    {
        return forwarded.to_owned();
    }

    peer.map_or_else(|| UNKNOWN_CLIENT.to_owned(), |addr| addr.ip().to_string())
}
