//! Application context built once at startup and shared by every component

use crate::config::ProxyConfig;
use crate::player_registry::PlayerRegistry;
use crate::rank_store::RankStore;
use crate::session::{ProxyRuntime, SessionTracker};
use crate::sync_engine::SyncEngine;
use crate::topology::ServerTopology;
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

pub const RANKS_FILE: &str = "ranks.json";
pub const PLAYERS_FILE: &str = "players.json";

pub struct AppContext {
    pub config: ProxyConfig,
    pub store: Arc<RankStore>,
    pub registry: Arc<PlayerRegistry>,
    pub topology: Arc<ServerTopology>,
    pub engine: Arc<SyncEngine>,
    pub sessions: Arc<SessionTracker>,
    pub runtime: Arc<dyn ProxyRuntime>,
}

impl AppContext {
    /// Loads persisted state from `data_dir` and wires the components.
    /// Configuration problems are logged, never fatal.
    pub fn initialize(config: ProxyConfig, data_dir: &Path) -> Result<Arc<Self>, reqwest::Error> {
        let store = Arc::new(RankStore::open(data_dir.join(RANKS_FILE)));
        let registry = Arc::new(PlayerRegistry::open(data_dir.join(PLAYERS_FILE)));

        let (topology, errors) = ServerTopology::from_config(&config);
        for e in &errors {
            error!("Configuration error: {}", e);
        }
        info!("Configured {} backend servers", topology.len());
        let topology = Arc::new(topology);

        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            Arc::clone(&topology),
            &config.api.key,
            &config.settings,
        )?);

        let sessions = Arc::new(SessionTracker::new(config.settings.max_players));
        let runtime: Arc<dyn ProxyRuntime> = sessions.clone();

        Ok(Arc::new(Self {
            config,
            store,
            registry,
            topology,
            engine,
            sessions,
            runtime,
        }))
    }

    pub fn api_key(&self) -> &str {
        &self.config.api.key
    }
}
