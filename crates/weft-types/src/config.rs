//! Engine configuration types for Weft.
//!
//! `EngineConfig` represents the `config.toml` that tunes node strategies.
//! Every field has a default so a missing or partial file is valid.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub entity: EntityConfig,
}

/// Settings for outbound HTTP nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Default per-request timeout when a node sets none.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Redirects followed before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Disables the private-address guard. Local development only.
    #[serde(default)]
    pub allow_private_targets: bool,
}

/// Upper bound for any per-node HTTP timeout.
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    "weft-workflow/0.1".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            allow_private_targets: false,
        }
    }
}

/// Settings for entity CRUD nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,
    #[serde(default = "max_query_limit")]
    pub max_query_limit: usize,
}

fn default_query_limit() -> usize {
    100
}

fn max_query_limit() -> usize {
    1000
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            default_query_limit: default_query_limit(),
            max_query_limit: max_query_limit(),
        }
    }
}
