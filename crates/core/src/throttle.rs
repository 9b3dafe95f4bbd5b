//! Per-session request cooldown.
//!
//! State is process-local: every server instance enforces its own window, so
//! behind a load balancer a session can be admitted once per instance within
//! the same window. This is best-effort backpressure, not a global limit.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Minimum spacing between two accepted requests from the same session.
pub const COOLDOWN_WINDOW: Duration = Duration::from_millis(5000);
/// Session key used when a request carries no identifying information.
pub const FALLBACK_SESSION_KEY: &str = "unknown";

/// Identifies whose cooldown a request counts against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Picks the wallet address, else the first forwarded client address,
    /// else the peer address, else [`FALLBACK_SESSION_KEY`]. Blank values are
    /// skipped.
    pub fn resolve(
        wallet_address: Option<&str>,
        forwarded_for: Option<&str>,
        peer: Option<IpAddr>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim);

        if let Some(wallet) = wallet_address.map(str::trim).filter(|w| !w.is_empty()) {
            return Self::new(wallet);
        }
        if let Some(client) = forwarded.filter(|c| !c.is_empty()) {
            return Self::new(client);
        }
        match peer {
            Some(ip) => Self::new(ip.to_string()),
            None => Self::new(FALLBACK_SESSION_KEY),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Storage for the last accepted request time of each session.
///
/// The throttle only needs point reads and writes, so the same logic can run
/// against process memory or an external key-value store.
pub trait CooldownStore: Send {
    fn get(&self, key: &SessionKey) -> Option<Instant>;
    fn set(&mut self, key: SessionKey, accepted_at: Instant);
}

/// Process-local store. Entries are only ever overwritten, never expired.
#[derive(Debug, Default)]
pub struct InMemoryCooldownStore {
    entries: HashMap<SessionKey, Instant>,
}

impl InMemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CooldownStore for InMemoryCooldownStore {
    fn get(&self, key: &SessionKey) -> Option<Instant> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: SessionKey, accepted_at: Instant) {
        self.entries.insert(key, accepted_at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject { remaining_seconds: u64 },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accept)
    }
}

pub struct SessionThrottle<S = InMemoryCooldownStore> {
    store: Mutex<S>,
    window: Duration,
}

impl SessionThrottle<InMemoryCooldownStore> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryCooldownStore::new())
    }
}

impl Default for SessionThrottle<InMemoryCooldownStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S: CooldownStore> SessionThrottle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            window: COOLDOWN_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decides whether a request from `key` arriving at `now` may proceed.
    ///
    /// An accepted request records `now` before any work is done for it, so a
    /// second request racing the first is rejected. A rejected request leaves
    /// the stored time untouched and the caller keeps waiting out the
    /// original window.
    pub fn admit(&self, key: &SessionKey, now: Instant) -> Admission {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last_accepted) = store.get(key) {
            let elapsed = now.saturating_duration_since(last_accepted);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                let remaining_seconds = remaining.as_nanos().div_ceil(1_000_000_000) as u64;
                tracing::debug!(
                    "throttled session {} for {}s",
                    key.as_str(),
                    remaining_seconds
                );
                return Admission::Reject { remaining_seconds };
            }
        }

        store.set(key.clone(), now);
        Admission::Accept
    }

    pub fn last_accepted(&self, key: &SessionKey) -> Option<Instant> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn first_request_is_accepted_and_recorded() {
        let throttle = SessionThrottle::in_memory();
        let key = SessionKey::new("0xwallet");
        let t = Instant::now();

        assert_eq!(throttle.admit(&key, t), Admission::Accept);
        assert_eq!(throttle.last_accepted(&key), Some(t));
    }

    #[test]
    fn just_inside_the_window_is_rejected_with_one_second_left() {
        let throttle = SessionThrottle::in_memory();
        let key = SessionKey::new("0xwallet");
        let t = Instant::now();

        throttle.admit(&key, t);
        assert_eq!(
            throttle.admit(&key, t + ms(4999)),
            Admission::Reject {
                remaining_seconds: 1
            }
        );
    }

    #[test]
    fn window_boundary_accepts_and_moves_the_timestamp() {
        let throttle = SessionThrottle::in_memory();
        let key = SessionKey::new("0xwallet");
        let t = Instant::now();

        throttle.admit(&key, t);
        assert_eq!(throttle.admit(&key, t + ms(5000)), Admission::Accept);
        assert_eq!(throttle.last_accepted(&key), Some(t + ms(5000)));
    }

    #[test]
    fn rejected_attempts_do_not_reset_the_window() {
        let throttle = SessionThrottle::in_memory();
        let key = SessionKey::new("10.0.0.7");
        let t = Instant::now();

        throttle.admit(&key, t);
        assert_eq!(
            throttle.admit(&key, t + ms(2000)),
            Admission::Reject {
                remaining_seconds: 3
            }
        );
        assert_eq!(
            throttle.admit(&key, t + ms(3000)),
            Admission::Reject {
                remaining_seconds: 2
            }
        );
        assert_eq!(throttle.last_accepted(&key), Some(t));
        assert_eq!(throttle.admit(&key, t + ms(5000)), Admission::Accept);
    }

    #[test]
    fn remaining_seconds_round_up() {
        let throttle = SessionThrottle::in_memory();
        let key = SessionKey::new("k");
        let t = Instant::now();

        throttle.admit(&key, t);
        assert_eq!(
            throttle.admit(&key, t + Duration::from_micros(1)),
            Admission::Reject {
                remaining_seconds: 5
            }
        );
        assert_eq!(
            throttle.admit(&key, t + ms(1000)),
            Admission::Reject {
                remaining_seconds: 4
            }
        );
    }

    #[test]
    fn sessions_are_independent() {
        let throttle = SessionThrottle::in_memory();
        let t = Instant::now();

        assert!(throttle.admit(&SessionKey::new("a"), t).is_accepted());
        assert!(throttle.admit(&SessionKey::new("b"), t + ms(10)).is_accepted());
        assert!(!throttle.admit(&SessionKey::new("a"), t + ms(20)).is_accepted());
    }

    #[test]
    fn custom_window_is_honoured() {
        let throttle = SessionThrottle::in_memory().with_window(ms(100));
        let key = SessionKey::new("k");
        let t = Instant::now();

        throttle.admit(&key, t);
        assert!(throttle.admit(&key, t + ms(100)).is_accepted());
    }

    #[test]
    fn session_key_prefers_wallet_then_forwarded_then_peer() {
        let peer = Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9)));

        let key = SessionKey::resolve(Some("0xabc"), Some("1.2.3.4"), peer);
        assert_eq!(key.as_str(), "0xabc");

        let key = SessionKey::resolve(Some("  "), Some("1.2.3.4, 10.0.0.1"), peer);
        assert_eq!(key.as_str(), "1.2.3.4");

        let key = SessionKey::resolve(None, None, peer);
        assert_eq!(key.as_str(), "192.168.1.9");

        let key = SessionKey::resolve(None, Some(""), None);
        assert_eq!(key.as_str(), FALLBACK_SESSION_KEY);
    }
}
