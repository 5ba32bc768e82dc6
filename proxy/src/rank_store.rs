//! Authoritative player → rank mapping
//!
//! The store is the single source of truth for which ranks a player holds.
//! Every mutation is written through to the rank map file so a grant that
//! was acknowledged survives a restart even if it was never pushed.
//!
//! Locking is split in two: `ranks` guards the in-memory map and is only
//! held long enough to mutate or clone it, while `persist_lock` serializes
//! disk writes so the newest snapshot always lands last.

use crate::error::StoreError;
use crate::persist::{read_json, write_json_atomic};
use log::{debug, info, warn};
use shared::normalize_username;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// On-disk layout: `{ "username": ["rank", ...] }`
type RankDocument = BTreeMap<String, Vec<String>>;

pub struct RankStore {
    ranks: Mutex<HashMap<String, BTreeSet<String>>>,
    persist_lock: Mutex<()>,
    path: PathBuf,
}

impl RankStore {
    /// Creates an empty store backed by `path` without touching the disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            ranks: Mutex::new(HashMap::new()),
            persist_lock: Mutex::new(()),
            path: path.into(),
        }
    }

    /// Creates a store and loads it from `path`, falling back to an empty
    /// store if the file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        match store.load() {
            Ok(count) => info!("Loaded ranks for {} players from {:?}", count, store.path),
            Err(e) => warn!("Starting with an empty rank store: {}", e),
        }
        store
    }

    /// Replaces the in-memory map with the file contents. Returns the number
    /// of players loaded. A missing file loads as empty.
    pub fn load(&self) -> Result<usize, StoreError> {
        let document: RankDocument = read_json(&self.path)?.unwrap_or_default();

        let mut loaded: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (username, ranks) in document {
            let key = normalize_username(&username);
            if key.is_empty() {
                continue;
            }
            // Entries differing only in case are merged
            loaded
                .entry(key)
                .or_default()
                .extend(ranks.into_iter().filter(|rank| !rank.is_empty()));
        }
        loaded.retain(|_, ranks| !ranks.is_empty());

        let count = loaded.len();
        *self.lock_ranks() = loaded;
        Ok(count)
    }

    /// Writes the current map to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let document: RankDocument = {
            let ranks = self.lock_ranks();
            ranks
                .iter()
                .map(|(username, set)| (username.clone(), set.iter().cloned().collect()))
                .collect()
        };

        write_json_atomic(&self.path, &document)
    }

    /// Adds `rank_id` to the player's set. Returns Ok(true) if the rank was
    /// newly added. The in-memory grant stands even when persisting fails.
    pub fn grant(&self, username: &str, rank_id: &str) -> Result<bool, StoreError> {
        let key = normalize_username(username);
        if key.is_empty() || rank_id.is_empty() {
            warn!("Ignoring grant with empty username or rank");
            return Ok(false);
        }

        let added = self
            .lock_ranks()
            .entry(key.clone())
            .or_default()
            .insert(rank_id.to_string());

        if !added {
            debug!("Player {} already holds rank {}", key, rank_id);
            return Ok(false);
        }

        info!("Granted rank {} to player {}", rank_id, key);
        self.save()?;
        Ok(true)
    }

    /// Removes `rank_id` from the player's set. Returns Ok(true) if it was
    /// present.
    pub fn revoke(&self, username: &str, rank_id: &str) -> Result<bool, StoreError> {
        let key = normalize_username(username);

        let removed = {
            let mut ranks = self.lock_ranks();
            match ranks.get_mut(&key) {
                Some(set) => {
                    let removed = set.remove(rank_id);
                    if set.is_empty() {
                        ranks.remove(&key);
                    }
                    removed
                }
                None => false,
            }
        };

        if removed {
            info!("Revoked rank {} from player {}", rank_id, key);
            self.save()?;
        }
        Ok(removed)
    }

    /// Snapshot of the player's ranks.
    pub fn ranks_of(&self, username: &str) -> BTreeSet<String> {
        self.lock_ranks()
            .get(&normalize_username(username))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_rank(&self, username: &str, rank_id: &str) -> bool {
        self.lock_ranks()
            .get(&normalize_username(username))
            .is_some_and(|ranks| ranks.contains(rank_id))
    }

    /// Snapshot of every player with at least one rank, sorted by username.
    pub fn players(&self) -> Vec<(String, BTreeSet<String>)> {
        let mut players: Vec<_> = self
            .lock_ranks()
            .iter()
            .map(|(username, ranks)| (username.clone(), ranks.clone()))
            .collect();
        players.sort_by(|a, b| a.0.cmp(&b.0));
        players
    }

    pub fn len(&self) -> usize {
        self.lock_ranks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_ranks().is_empty()
    }

    fn lock_ranks(&self) -> MutexGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.ranks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn test_store() -> (tempfile::TempDir, RankStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RankStore::new(dir.path().join("ranks.json"));
        (dir, store)
    }

    fn set(ranks: &[&str]) -> BTreeSet<String> {
        ranks.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_grant_is_idempotent() {
        let (_dir, store) = test_store();

        assert!(store.grant("bob", "vip").unwrap());
        assert!(!store.grant("bob", "vip").unwrap());
        assert_eq!(store.ranks_of("bob"), set(&["vip"]));
    }

    #[test]
    fn test_usernames_are_case_insensitive() {
        let (_dir, store) = test_store();

        assert_ok!(store.grant("Alice", "vip"));
        assert_eq!(store.ranks_of("ALICE"), set(&["vip"]));
        assert!(store.has_rank("alice", "vip"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ranks_of_returns_a_copy() {
        let (_dir, store) = test_store();
        assert_ok!(store.grant("bob", "vip"));

        let mut snapshot = store.ranks_of("bob");
        snapshot.insert("builder".to_string());

        assert_eq!(store.ranks_of("bob"), set(&["vip"]));
    }

    #[test]
    fn test_unknown_player_has_no_ranks() {
        let (_dir, store) = test_store();
        assert!(store.ranks_of("ghost").is_empty());
        assert!(!store.has_rank("ghost", "vip"));
    }

    #[test]
    fn test_revoke() {
        let (dir, store) = test_store();
        let path = dir.path().join("ranks.json");
        assert_ok!(store.grant("bob", "vip"));
        assert_ok!(store.grant("bob", "builder"));

        assert!(store.revoke("BOB", "vip").unwrap());
        assert!(!store.revoke("bob", "vip").unwrap());
        assert_eq!(store.ranks_of("bob"), set(&["builder"]));

        let reloaded = RankStore::new(&path);
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.ranks_of("bob"), set(&["builder"]));

        assert!(store.revoke("bob", "builder").unwrap());
        assert!(store.is_empty());

        let reloaded = RankStore::new(&path);
        assert_eq!(reloaded.load().unwrap(), 0);
        assert!(!reloaded.has_rank("bob", "builder"));
    }

    #[test]
    fn test_empty_rank_is_ignored() {
        let (_dir, store) = test_store();
        assert!(!store.grant("bob", "").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let (dir, store) = test_store();
        assert_ok!(store.grant("bob", "vip"));
        assert_ok!(store.grant("bob", "builder"));

        let reloaded = RankStore::new(dir.path().join("ranks.json"));
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.ranks_of("bob"), set(&["builder", "vip"]));
    }

    #[test]
    fn test_load_merges_case_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.json");
        std::fs::write(&path, r#"{"Bob":["vip"],"bob":["builder"],"eve":[]}"#).unwrap();

        let store = RankStore::new(&path);
        assert_eq!(store.load().unwrap(), 1);
        assert_eq!(store.ranks_of("bob"), set(&["builder", "vip"]));
    }

    #[test]
    fn test_open_falls_back_to_empty_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = RankStore::new(&path);
        assert_err!(store.load());

        let opened = RankStore::open(&path);
        assert!(opened.is_empty());
    }

    #[test]
    fn test_unchanged_store_never_rewrites_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.json");
        let original = br#"{"bob":["vip","builder"],"alice":["mayor"]},"#;
        std::fs::write(&path, original).unwrap();

        let store = RankStore::open(&path);
        assert!(store.is_empty());
        assert!(!store.has_rank("bob", "vip"));
        drop(store);

        assert_eq!(std::fs::read(&path).unwrap(), original.to_vec());
    }

    #[test]
    fn test_grant_survives_failed_save() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("ranks.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let store = RankStore::new(&path);
        assert_err!(store.grant("bob", "vip"));
        assert!(store.has_rank("bob", "vip"));
    }

    #[test]
    fn test_concurrent_grants() {
        let (dir, store) = test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        store.grant("bob", &format!("rank{}_{}", i, j)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.ranks_of("bob").len(), 80);

        let reloaded = RankStore::new(dir.path().join("ranks.json"));
        reloaded.load().unwrap();
        assert_eq!(reloaded.ranks_of("bob").len(), 80);
    }
}
