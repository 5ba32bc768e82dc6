//! Online-player view of the host proxy runtime

use shared::normalize_username;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// What the core needs to know about the host proxy.
pub trait ProxyRuntime: Send + Sync {
    fn is_online(&self, username: &str) -> bool;
    fn online_count(&self) -> usize;
    fn max_players(&self) -> usize;
    fn version(&self) -> String;
}

/// Tracks online players from join/leave events.
pub struct SessionTracker {
    online: Mutex<HashSet<String>>,
    max_players: usize,
}

impl SessionTracker {
    pub fn new(max_players: usize) -> Self {
        Self {
            online: Mutex::new(HashSet::new()),
            max_players,
        }
    }

    pub fn player_joined(&self, username: &str) {
        self.lock_online().insert(normalize_username(username));
    }

    pub fn player_left(&self, username: &str) -> bool {
        self.lock_online().remove(&normalize_username(username))
    }

    fn lock_online(&self) -> MutexGuard<'_, HashSet<String>> {
        self.online
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProxyRuntime for SessionTracker {
    fn is_online(&self, username: &str) -> bool {
        self.lock_online().contains(&normalize_username(username))
    }

    fn online_count(&self) -> usize {
        self.lock_online().len()
    }

    fn max_players(&self) -> usize {
        self.max_players
    }

    fn version(&self) -> String {
        format!("rank-sync-proxy {}", env!("CARGO_PKG_VERSION"))
    }
}
