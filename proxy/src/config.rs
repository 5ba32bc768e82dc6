//! Proxy configuration loaded from `config.toml` in the data directory

use crate::error::ConfigError;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

/// Written to the data directory when no config file exists yet.
pub const DEFAULT_CONFIG: &str = r#"[api]
port = 8113
key = "your_secure_api_key_here"

[servers.lobby]
name = "lobby"
host = "localhost"
port = 25565
api_port = 8113

[servers.towny]
name = "towny"
host = "localhost"
port = 25566
api_port = 8114
category = "towny"

[categories.towny]
ranks = ["citizen", "merchant", "councilor", "mayor", "governor", "noble", "duke", "king", "emperor", "divine"]

[categories.towny.upgrades]
citizen_to_merchant = "merchant"
merchant_to_councilor = "councilor"
councilor_to_mayor = "mayor"
mayor_to_governor = "governor"
governor_to_noble = "noble"
noble_to_duke = "duke"
duke_to_king = "king"
king_to_emperor = "emperor"
emperor_to_divine = "divine"

[settings]
debug = false
save_interval = 300
sync_interval = 300
request_timeout_ms = 5000
sync_deadline_ms = 10000
probe_timeout_ms = 1000
max_players = 500
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    pub api: ApiConfig,
    /// Backends keyed by their table name.
    pub servers: BTreeMap<String, ServerConfig>,
    /// Rank categories that restrict routing, keyed by category name.
    pub categories: BTreeMap<String, CategoryConfig>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    pub key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: shared::DEFAULT_API_PORT,
            key: "your_secure_api_key_here".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend name as known to the proxy. Defaults to the table key.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_game_port")]
    pub port: u16,
    #[serde(default = "default_backend_api_port")]
    pub api_port: u16,
    /// Category tag; an untagged backend's category is its name.
    #[serde(default)]
    pub category: Option<String>,
}

fn default_game_port() -> u16 {
    25565
}

fn default_backend_api_port() -> u16 {
    shared::DEFAULT_API_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CategoryConfig {
    pub ranks: Vec<String>,
    /// Upgrade chain (`step → rank`). Only the values matter for routing.
    pub upgrades: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Advisory only, no background save loop runs.
    pub save_interval: u64,
    /// Advisory only, no background sync loop runs.
    pub sync_interval: u64,
    pub request_timeout_ms: u64,
    pub sync_deadline_ms: u64,
    pub probe_timeout_ms: u64,
    pub max_players: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            save_interval: 300,
            sync_interval: 300,
            request_timeout_ms: 5000,
            sync_deadline_ms: 10_000,
            probe_timeout_ms: 1000,
            max_players: 500,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sync_deadline(&self) -> Duration {
        Duration::from_millis(self.sync_deadline_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl ProxyConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `config.toml` from `data_dir`, writing the default document
    /// first if none exists. Any failure is logged and the built-in defaults
    /// are used so the proxy still starts.
    pub fn load_or_create(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        info!("Loading configuration from: {:?}", path);

        if !path.exists() {
            if let Err(e) = Self::write_default(data_dir) {
                error!("{}", e);
                return Self::defaults();
            }
            info!("Created default configuration file");
        }

        match Self::load(&path) {
            Ok(config) => {
                info!("Configuration loaded successfully");
                config
            }
            Err(e) => {
                error!("{}. Using default values.", e);
                Self::defaults()
            }
        }
    }

    fn write_default(data_dir: &Path) -> Result<(), ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        fs::create_dir_all(data_dir)
            .and_then(|_| fs::write(&path, DEFAULT_CONFIG))
            .map_err(|source| ConfigError::WriteDefault { path, source })
    }

    /// The same values as [`DEFAULT_CONFIG`].
    pub fn defaults() -> Self {
        let towny_ranks = [
            "citizen",
            "merchant",
            "councilor",
            "mayor",
            "governor",
            "noble",
            "duke",
            "king",
            "emperor",
            "divine",
        ];

        let upgrades = towny_ranks
            .windows(2)
            .map(|pair| (format!("{}_to_{}", pair[0], pair[1]), pair[1].to_string()))
            .collect();

        let mut servers = BTreeMap::new();
        servers.insert(
            "lobby".to_string(),
            ServerConfig {
                name: Some("lobby".to_string()),
                host: Some("localhost".to_string()),
                port: 25565,
                api_port: 8113,
                category: None,
            },
        );
        servers.insert(
            "towny".to_string(),
            ServerConfig {
                name: Some("towny".to_string()),
                host: Some("localhost".to_string()),
                port: 25566,
                api_port: 8114,
                category: Some("towny".to_string()),
            },
        );

        let mut categories = BTreeMap::new();
        categories.insert(
            "towny".to_string(),
            CategoryConfig {
                ranks: towny_ranks.iter().map(|r| r.to_string()).collect(),
                upgrades,
            },
        );

        Self {
            api: ApiConfig::default(),
            servers,
            categories,
            settings: Settings::default(),
        }
    }
}
