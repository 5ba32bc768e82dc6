use serde::{Deserialize, Serialize};

pub const DEFAULT_API_PORT: u16 = 8113;
pub const APPLY_RANK_PATH: &str = "/api/apply-rank";
pub const BEARER_PREFIX: &str = "Bearer ";

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const MISSING_FIELDS: &str = "Missing username or rank";

/// Canonical form of a player name used for every storage and lookup key.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Inbound apply-rank body. `rank` and `rankId` are aliases of each other.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApplyRankRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default, rename = "rankId")]
    pub rank_id: Option<String>,
}

impl ApplyRankRequest {
    /// Returns the normalized username and the resolved rank, or None when
    /// either is missing or blank. `rank` takes precedence over `rankId`.
    pub fn validate(&self) -> Option<(String, String)> {
        let username = self
            .username
            .as_deref()
            .map(normalize_username)
            .filter(|name| !name.is_empty())?;

        let rank = [self.rank.as_deref(), self.rank_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|rank| !rank.is_empty())?;

        Some((username, rank.to_string()))
    }
}

/// Outbound body pushed to a backend's apply-rank endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RankPush {
    pub username: String,
    pub rank: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApplyRankResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerExistsResponse {
    pub exists: bool,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlayerEntry {
    pub username: String,
}

/// Player listing body. Also the on-disk layout of the player registry.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PlayerList {
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub online: bool,
    pub version: String,
    pub players: usize,
    #[serde(rename = "maxPlayers")]
    pub max_players: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ResyncRequest {
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResyncResponse {
    pub success: bool,
    pub attempted: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
