//! Outbound rank synchronization to backend servers
//!
//! A push is one authenticated POST of `{username, rank}` to a backend's
//! apply-rank endpoint. Pushes are never retried automatically and a failed
//! push never rolls back the local grant; failures are logged with a
//! correlation token and folded into the caller's boolean result.
//!
//! Two time limits apply:
//! - every request is bounded by the client's request timeout
//! - connection-triggered syncs are additionally bounded by an overall
//!   deadline, after which the waiter gives up and logs while the request
//!   task is left to finish on its own

use crate::config::Settings;
use crate::error::{PushError, SyncError};
use crate::rank_store::RankStore;
use crate::topology::ServerInfo;
use crate::topology::ServerTopology;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use shared::{normalize_username, RankPush, APPLY_RANK_PATH};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// One in-flight push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSync {
    pub username: String,
    pub rank_id: String,
    pub backend: String,
    /// Short random token tying together the log lines of one attempt
    pub correlation: String,
}

impl PendingSync {
    pub fn new(username: &str, rank_id: &str, backend: &str) -> Self {
        Self {
            username: username.to_string(),
            rank_id: rank_id.to_string(),
            backend: backend.to_string(),
            correlation: format!("{:08x}", rand::random::<u32>()),
        }
    }
}

/// Aggregate result of pushing several ranks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub failed: usize,
    /// Ranks not pushed because routing excludes the backend
    pub skipped: usize,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.attempted += other.attempted;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

pub struct SyncEngine {
    store: Arc<RankStore>,
    topology: Arc<ServerTopology>,
    http: reqwest::Client,
    api_key: String,
    sync_deadline: Duration,
    probe_timeout: Duration,
}

impl SyncEngine {
    pub fn new(
        store: Arc<RankStore>,
        topology: Arc<ServerTopology>,
        api_key: &str,
        settings: &Settings,
    ) -> Result<Self, reqwest::Error> {
        let request_timeout = settings.request_timeout();
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            store,
            topology,
            http,
            api_key: api_key.to_string(),
            sync_deadline: settings.sync_deadline(),
            probe_timeout: settings.probe_timeout(),
        })
    }

    pub fn store(&self) -> &Arc<RankStore> {
        &self.store
    }

    pub fn topology(&self) -> &Arc<ServerTopology> {
        &self.topology
    }

    /// Pushes one rank for one player to one backend. No retry.
    pub async fn push_one(
        &self,
        username: &str,
        rank_id: &str,
        backend: &ServerInfo,
    ) -> Result<(), PushError> {
        let pending = PendingSync::new(username, rank_id, &backend.name);
        debug!(
            "[{}] Pushing rank {} for player {} to {} ({})",
            pending.correlation,
            pending.rank_id,
            pending.username,
            pending.backend,
            backend.api_url(APPLY_RANK_PATH)
        );

        let result = self.send(&pending, backend).await;
        match &result {
            Ok(()) => info!(
                "[{}] Synced rank {} for player {} on server {}",
                pending.correlation, pending.rank_id, pending.username, pending.backend
            ),
            Err(e) => error!(
                "[{}] Error syncing rank {} for player {} on server {}: {}",
                pending.correlation, pending.rank_id, pending.username, pending.backend, e
            ),
        }
        result
    }

    async fn send(&self, pending: &PendingSync, backend: &ServerInfo) -> Result<(), PushError> {
        let body = RankPush {
            username: pending.username.clone(),
            rank: pending.rank_id.clone(),
        };

        let response = self
            .http
            .post(backend.api_url(APPLY_RANK_PATH))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Pushes every rank the player holds that routes to `backend`.
    /// Continues through failures.
    pub async fn push_all_ranks(&self, username: &str, backend: &ServerInfo) -> SyncReport {
        let username = normalize_username(username);
        let ranks = self.store.ranks_of(&username);
        if ranks.is_empty() {
            debug!("No ranks to sync for player {}", username);
        }
        self.push_ranks(&username, &ranks, backend).await
    }

    async fn push_ranks(
        &self,
        username: &str,
        ranks: &BTreeSet<String>,
        backend: &ServerInfo,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for rank_id in ranks {
            if !self.topology.routes_to(rank_id, backend) {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;
            if self.push_one(username, rank_id, backend).await.is_err() {
                report.failed += 1;
            }
        }
        report
    }

    /// Records the grant locally, then pushes it to every routed backend.
    ///
    /// Returns Ok(true) only if every routed push succeeded. The grant is
    /// kept whatever the outcome of the pushes; a failure to persist it is
    /// logged and the in-memory grant stays authoritative.
    pub async fn apply_globally(&self, username: &str, rank_id: &str) -> Result<bool, SyncError> {
        let username = normalize_username(username);

        let store = Arc::clone(&self.store);
        let (user, rank) = (username.clone(), rank_id.to_string());
        if let Err(e) = tokio::task::spawn_blocking(move || store.grant(&user, &rank)).await? {
            error!(
                "Failed to persist rank {} for player {}: {}",
                rank_id, username, e
            );
        }

        let backends = self.topology.routed_backends(rank_id);
        if backends.is_empty() {
            warn!(
                "Rank {} for player {} routes to no configured backend",
                rank_id, username
            );
        }

        let mut success = true;
        for backend in backends {
            if self.push_one(&username, rank_id, backend).await.is_err() {
                success = false;
            }
        }
        Ok(success)
    }

    /// Syncs the player's ranks to `backend` in the background.
    ///
    /// The returned handle completes as soon as the sync finishes or the
    /// overall deadline passes, whichever comes first. Dropping it is fine.
    pub fn sync_on_connect(self: &Arc<Self>, username: &str, backend: ServerInfo) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let username = normalize_username(username);
        let deadline = self.sync_deadline;

        tokio::spawn(async move {
            let backend_name = backend.name.clone();
            let worker = {
                let engine = Arc::clone(&engine);
                let username = username.clone();
                tokio::spawn(async move { engine.push_all_ranks(&username, &backend).await })
            };

            // On expiry the worker is detached, not aborted
            match timeout(deadline, worker).await {
                Ok(Ok(report)) if report.is_success() => debug!(
                    "Synced {} ranks for player {} on server {}",
                    report.attempted, username, backend_name
                ),
                Ok(Ok(report)) => warn!(
                    "{} of {} rank pushes failed for player {} on server {}",
                    report.failed, report.attempted, username, backend_name
                ),
                Ok(Err(e)) => error!(
                    "Sync task for player {} on server {} failed: {}",
                    username, backend_name, e
                ),
                Err(_) => error!(
                    "Timeout syncing ranks for player {} on server {} after {:?}",
                    username, backend_name, deadline
                ),
            }
        })
    }

    /// Liveness probe: can we open a TCP connection to the game port?
    pub async fn is_reachable(&self, backend: &ServerInfo) -> bool {
        match timeout(self.probe_timeout, TcpStream::connect(backend.game_addr())).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Server {} is unreachable: {}", backend.name, e);
                false
            }
            Err(_) => {
                debug!("Ping to server {} timed out", backend.name);
                false
            }
        }
    }

    /// Pushes every stored rank of every player to `backend`.
    pub async fn resync_backend(&self, backend: &ServerInfo) -> SyncReport {
        info!("Resyncing all ranks to server {}", backend.name);

        let mut report = SyncReport::default();
        for (username, ranks) in self.store.players() {
            report.merge(self.push_ranks(&username, &ranks, backend).await);
        }

        info!(
            "Resync to {} finished: {} pushed, {} failed",
            backend.name, report.attempted, report.failed
        );
        report
    }

    /// Resyncs every reachable backend. Unreachable backends are skipped.
    pub async fn resync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for backend in self.topology.all_backends() {
            if !self.is_reachable(backend).await {
                warn!("Skipping resync of unreachable server {}", backend.name);
                continue;
            }
            report.merge(self.resync_backend(backend).await);
        }
        report
    }
}
