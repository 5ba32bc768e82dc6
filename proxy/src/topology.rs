//! Backend server table and rank routing policy
//!
//! Built once from configuration and read-only afterwards. Routing is
//! default-open: a rank that belongs to no restricted category goes to
//! every backend.

use crate::config::ProxyConfig;
use crate::error::ConfigError;
use log::{debug, error};
use std::collections::{BTreeMap, BTreeSet};

/// Connection details for one backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub host: String,
    pub game_port: u16,
    pub api_port: u16,
    /// Category used for routing; the backend name when untagged.
    pub category: String,
}

impl ServerInfo {
    pub fn new(name: &str, host: &str, game_port: u16, api_port: u16) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            game_port,
            api_port,
            category: name.to_lowercase(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_lowercase();
        self
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.api_port, path)
    }

    pub fn game_addr(&self) -> String {
        format!("{}:{}", self.host, self.game_port)
    }
}

/// Where pushes for a rank must go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    All,
    Category(String),
}

#[derive(Debug, Clone, Default)]
pub struct ServerTopology {
    backends: Vec<ServerInfo>,
    /// rank id → restricting category
    restricted: BTreeMap<String, String>,
}

impl ServerTopology {
    pub fn new(backends: Vec<ServerInfo>) -> Self {
        Self {
            backends,
            restricted: BTreeMap::new(),
        }
    }

    /// Restricts every rank in `ranks` to backends of `category`.
    pub fn with_category<I, S>(mut self, category: &str, ranks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = category.to_lowercase();
        for rank in ranks {
            self.restricted
                .insert(rank.as_ref().to_string(), category.clone());
        }
        self
    }

    /// Builds the topology from configuration. Backends without a host are
    /// left out and returned as errors for the caller to report.
    pub fn from_config(config: &ProxyConfig) -> (Self, Vec<ConfigError>) {
        let mut backends = Vec::new();
        let mut errors = Vec::new();

        for (key, server) in &config.servers {
            let name = server.name.as_deref().unwrap_or(key);
            let host = match server.host.as_deref().map(str::trim) {
                Some(host) if !host.is_empty() => host,
                _ => {
                    error!("Backend {} has no host configured, skipping it", name);
                    errors.push(ConfigError::MissingHost(name.to_string()));
                    continue;
                }
            };

            let mut info = ServerInfo::new(name, host, server.port, server.api_port);
            if let Some(category) = &server.category {
                info = info.with_category(category);
            }
            debug!(
                "Loaded backend {}: {} (API port: {}, category: {})",
                info.name,
                info.game_addr(),
                info.api_port,
                info.category
            );
            backends.push(info);
        }

        let mut topology = Self::new(backends);
        for (category, ranks) in &config.categories {
            let members: BTreeSet<&String> =
                ranks.ranks.iter().chain(ranks.upgrades.values()).collect();
            topology = topology.with_category(category, members);
        }

        (topology, errors)
    }

    /// Looks a backend up by name, ignoring case.
    pub fn backend_for(&self, name: &str) -> Option<&ServerInfo> {
        self.backends
            .iter()
            .find(|backend| backend.name.eq_ignore_ascii_case(name))
    }

    /// Like [`backend_for`](Self::backend_for) but reports a miss as a
    /// configuration error.
    pub fn require_backend(&self, name: &str) -> Result<&ServerInfo, ConfigError> {
        self.backend_for(name)
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string()))
    }

    pub fn all_backends(&self) -> &[ServerInfo] {
        &self.backends
    }

    pub fn route_for_rank(&self, rank_id: &str) -> Route {
        match self.restricted.get(rank_id) {
            Some(category) => Route::Category(category.clone()),
            None => Route::All,
        }
    }

    pub fn backends_for_route(&self, route: &Route) -> Vec<&ServerInfo> {
        match route {
            Route::All => self.backends.iter().collect(),
            Route::Category(category) => self
                .backends
                .iter()
                .filter(|backend| &backend.category == category)
                .collect(),
        }
    }

    /// The backends a push of `rank_id` must reach.
    pub fn routed_backends(&self, rank_id: &str) -> Vec<&ServerInfo> {
        self.backends_for_route(&self.route_for_rank(rank_id))
    }

    /// Whether a push of `rank_id` belongs on `backend`.
    pub fn routes_to(&self, rank_id: &str, backend: &ServerInfo) -> bool {
        match self.route_for_rank(rank_id) {
            Route::All => true,
            Route::Category(category) => backend.category == category,
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
