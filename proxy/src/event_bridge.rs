//! Adapter from host proxy events to core calls
//!
//! The host runtime delivers player events over a channel. Handling an event
//! never waits on disk or network: registry writes go to the blocking pool and
//! syncs run on detached tasks, so the dispatcher is never held up.

use crate::context::AppContext;
use crate::player_registry::PlayerRegistry;
use crate::session::SessionTracker;
use crate::sync_engine::SyncEngine;
use crate::topology::ServerTopology;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages delivered by the host proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyEvent {
    PlayerJoined { username: String },
    PlayerSwitchedServer { username: String, backend: String },
    PlayerLeft { username: String },
}

pub struct ProxyEventBridge {
    registry: Arc<PlayerRegistry>,
    sessions: Arc<SessionTracker>,
    topology: Arc<ServerTopology>,
    engine: Arc<SyncEngine>,
}

impl ProxyEventBridge {
    pub fn new(context: &AppContext) -> Self {
        Self {
            registry: Arc::clone(&context.registry),
            sessions: Arc::clone(&context.sessions),
            topology: Arc::clone(&context.topology),
            engine: Arc::clone(&context.engine),
        }
    }

    pub fn handle(&self, event: ProxyEvent) {
        match event {
            ProxyEvent::PlayerJoined { username } => {
                self.on_player_joined(&username);
            }
            ProxyEvent::PlayerSwitchedServer { username, backend } => {
                self.on_player_switched(&username, &backend);
            }
            ProxyEvent::PlayerLeft { username } => {
                self.on_player_left(&username);
            }
        }
    }

    /// Marks the player online and records them in the registry. The handle
    /// resolves to true if the player had never been seen before.
    pub fn on_player_joined(&self, username: &str) -> JoinHandle<bool> {
        info!("Player {} has joined the proxy", username);
        self.sessions.player_joined(username);

        let registry = Arc::clone(&self.registry);
        let username = username.to_string();
        tokio::task::spawn_blocking(move || registry.mark_seen(&username))
    }

    /// Starts a background sync of the player's ranks to `backend_name`.
    /// Returns None if the backend is not configured.
    pub fn on_player_switched(&self, username: &str, backend_name: &str) -> Option<JoinHandle<()>> {
        info!("Player {} has connected to server {}", username, backend_name);

        let backend = match self.topology.require_backend(backend_name) {
            Ok(backend) => backend.clone(),
            Err(e) => {
                warn!("Skipping rank sync for player {}: {}", username, e);
                return None;
            }
        };

        let engine = Arc::clone(&self.engine);
        let username = username.to_string();
        Some(tokio::spawn(async move {
            if !engine.is_reachable(&backend).await {
                debug!(
                    "Server {} is not reachable, skipping rank sync for {}",
                    backend.name, username
                );
                return;
            }

            if let Err(e) = engine.sync_on_connect(&username, backend).await {
                error!("Rank sync task for player {} panicked: {}", username, e);
            }
        }))
    }

    pub fn on_player_left(&self, username: &str) {
        if self.sessions.player_left(username) {
            info!("Player {} has left the proxy", username);
        }
    }

    /// Consumes events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ProxyEvent>) {
        info!("Event bridge started");
        while let Some(event) = events.recv().await {
            debug!("Received event {:?}", event);
            self.handle(event);
        }
        info!("Event bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::session::ProxyRuntime;

    fn test_context(dir: &tempfile::TempDir) -> Arc<AppContext> {
        AppContext::initialize(ProxyConfig::defaults(), dir.path()).unwrap()
    }

    #[test]
    fn test_event_wire_format() {
        let joined: ProxyEvent =
            serde_json::from_str(r#"{"type":"player_joined","username":"Steve"}"#).unwrap();
        assert_eq!(
            joined,
            ProxyEvent::PlayerJoined {
                username: "Steve".to_string()
            }
        );

        let switched: ProxyEvent = serde_json::from_str(
            r#"{"type":"player_switched_server","username":"steve","backend":"lobby"}"#,
        )
        .unwrap();
        assert_eq!(
            switched,
            ProxyEvent::PlayerSwitchedServer {
                username: "steve".to_string(),
                backend: "lobby".to_string()
            }
        );

        assert!(serde_json::from_str::<ProxyEvent>(r#"{"type":"teleported"}"#).is_err());
    }

    #[tokio::test]
    async fn test_join_registers_player() {
        let dir = tempfile::tempdir().unwrap();
        let context = test_context(&dir);
        let bridge = ProxyEventBridge::new(&context);

        assert!(bridge.on_player_joined("Steve").await.unwrap());
        assert!(!bridge.on_player_joined("steve").await.unwrap());
        assert!(context.registry.contains("steve"));
        assert!(context.runtime.is_online("steve"));
    }

    #[tokio::test]
    async fn test_leave_marks_offline_but_keeps_registry() {
        let dir = tempfile::tempdir().unwrap();
        let context = test_context(&dir);
        let bridge = ProxyEventBridge::new(&context);

        bridge.on_player_joined("steve").await.unwrap();
        bridge.on_player_left("steve");

        assert!(!context.runtime.is_online("steve"));
        assert!(context.registry.contains("steve"));
    }

    #[tokio::test]
    async fn test_switch_to_unknown_backend_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let context = test_context(&dir);
        let bridge = ProxyEventBridge::new(&context);

        assert!(bridge.on_player_switched("steve", "survival").is_none());
    }

    #[tokio::test]
    async fn test_run_processes_events_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let context = test_context(&dir);
        let bridge = ProxyEventBridge::new(&context);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(ProxyEvent::PlayerJoined {
            username: "alex".to_string(),
        })
        .unwrap();
        tx.send(ProxyEvent::PlayerSwitchedServer {
            username: "alex".to_string(),
            backend: "nowhere".to_string(),
        })
        .unwrap();
        drop(tx);

        bridge.run(rx).await;

        assert!(context.runtime.is_online("alex"));
        // The registry write runs on the blocking pool
        for _ in 0..50 {
            if context.registry.contains("alex") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(context.registry.contains("alex"));
    }
}
