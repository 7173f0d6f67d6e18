//! Engine configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.weft/` by default) and
//! deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use weft_types::config::{EngineConfig, MAX_HTTP_TIMEOUT_SECS};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WEFT_HOME";

/// Resolve the data directory.
///
/// Priority:
/// 1. `WEFT_HOME` environment variable
/// 2. `~/.weft`
/// 3. `.weft` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".weft");
    }

    PathBuf::from(".weft")
}

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparseable file: warning, then the default.
/// - Otherwise the parsed config with out-of-range values clamped.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => clamp(config),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

fn clamp(mut config: EngineConfig) -> EngineConfig {
    if config.http.timeout_secs == 0 || config.http.timeout_secs > MAX_HTTP_TIMEOUT_SECS {
        let clamped = config.http.timeout_secs.clamp(1, MAX_HTTP_TIMEOUT_SECS);
        tracing::warn!(
            configured = config.http.timeout_secs,
            clamped,
            "http.timeout_secs out of range"
        );
        config.http.timeout_secs = clamped;
    }

    let entity = &mut config.entity;
    if entity.max_query_limit == 0 {
        tracing::warn!("entity.max_query_limit must be at least 1, using 1");
        entity.max_query_limit = 1;
    }
    if entity.default_query_limit == 0 || entity.default_query_limit > entity.max_query_limit {
        let clamped = entity.default_query_limit.clamp(1, entity.max_query_limit);
        tracing::warn!(
            configured = entity.default_query_limit,
            clamped,
            "entity.default_query_limit out of range"
        );
        entity.default_query_limit = clamped;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_engine_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn load_engine_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[http]
timeout_secs = 10
max_redirects = 2
user_agent = "acme-flows/2.0"

[entity]
default_query_limit = 25
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.max_redirects, 2);
        assert_eq!(config.http.user_agent, "acme-flows/2.0");
        assert!(!config.http.allow_private_targets);
        assert_eq!(config.entity.default_query_limit, 25);
        assert_eq!(config.entity.max_query_limit, 1000);
    }

    #[tokio::test]
    async fn load_engine_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn load_engine_config_clamps_out_of_range_values() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[http]
timeout_secs = 9000

[entity]
default_query_limit = 500
max_query_limit = 50
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.http.timeout_secs, MAX_HTTP_TIMEOUT_SECS);
        assert_eq!(config.entity.default_query_limit, 50);
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching WEFT_HOME and restores it immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-weft");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-weft"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
