//! Durable record of every player ever seen joining the proxy

use crate::error::StoreError;
use crate::persist::{read_json, write_json_atomic};
use log::{info, warn};
use shared::{normalize_username, PlayerEntry, PlayerList};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Grow-only set of known usernames.
///
/// Answers "does this player exist" for offline players. The file is only
/// rewritten when a new name is recorded.
pub struct PlayerRegistry {
    players: Mutex<BTreeSet<String>>,
    persist_lock: Mutex<()>,
    path: PathBuf,
}

impl PlayerRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            players: Mutex::new(BTreeSet::new()),
            persist_lock: Mutex::new(()),
            path: path.into(),
        }
    }

    /// Creates a registry and loads it from `path`, falling back to empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let registry = Self::new(path);
        match registry.load() {
            Ok(count) => info!("Loaded {} known players from {:?}", count, registry.path),
            Err(e) => warn!("Starting with an empty player registry: {}", e),
        }
        registry
    }

    pub fn load(&self) -> Result<usize, StoreError> {
        let document: PlayerList = read_json(&self.path)?.unwrap_or_default();

        let loaded: BTreeSet<String> = document
            .players
            .iter()
            .map(|entry| normalize_username(&entry.username))
            .filter(|name| !name.is_empty())
            .collect();

        let count = loaded.len();
        *self.lock_players() = loaded;
        Ok(count)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let document = PlayerList {
            players: self
                .all()
                .into_iter()
                .map(|username| PlayerEntry { username })
                .collect(),
        };

        write_json_atomic(&self.path, &document)
    }

    /// Records `username`. Returns true only the first time a name is seen;
    /// persistence failures are logged and the in-memory record kept.
    pub fn mark_seen(&self, username: &str) -> bool {
        let key = normalize_username(username);
        if key.is_empty() {
            return false;
        }

        let inserted = self.lock_players().insert(key.clone());
        if inserted {
            info!("Registered new player {}", key);
            if let Err(e) = self.save() {
                warn!("Failed to persist player registry after adding {}: {}", key, e);
            }
        }
        inserted
    }

    pub fn contains(&self, username: &str) -> bool {
        self.lock_players().contains(&normalize_username(username))
    }

    /// Sorted snapshot of every known username.
    pub fn all(&self) -> Vec<String> {
        self.lock_players().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_players().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_players().is_empty()
    }

    fn lock_players(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.players
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
