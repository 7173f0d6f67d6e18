//! `weft config show`: print the effective engine configuration.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use weft_types::config::EngineConfig;

fn rows(config: &EngineConfig) -> Vec<(&'static str, String)> {
    vec![
        ("http.timeout_secs", config.http.timeout_secs.to_string()),
        ("http.max_redirects", config.http.max_redirects.to_string()),
        ("http.user_agent", config.http.user_agent.clone()),
        (
            "http.allow_private_targets",
            config.http.allow_private_targets.to_string(),
        ),
        (
            "entity.default_query_limit",
            config.entity.default_query_limit.to_string(),
        ),
        (
            "entity.max_query_limit",
            config.entity.max_query_limit.to_string(),
        ),
    ]
}

pub fn show_config(data_dir: &Path, config: &EngineConfig, json: bool) -> Result<()> {
    let config_path = data_dir.join("config.toml");

    if json {
        let report = json!({
            "dataDir": data_dir.display().to_string(),
            "configFile": config_path.display().to_string(),
            "configFileExists": config_path.exists(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Config file:").bold(),
        config_path.display()
    );
    if !config_path.exists() {
        println!("  {}", style("(not found, using defaults)").dim());
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Key").fg(Color::Cyan), Cell::new("Value")]);
    for (key, value) in rows(config) {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_every_setting() {
        let config = EngineConfig::default();
        let rows = rows(&config);
        assert_eq!(rows.len(), 6);
        assert!(rows.contains(&("http.timeout_secs", "30".to_string())));
        assert!(rows.contains(&("http.allow_private_targets", "false".to_string())));
    }

    #[test]
    fn test_show_config_json() {
        let dir = tempfile::tempdir().unwrap();
        show_config(dir.path(), &EngineConfig::default(), true).unwrap();
        show_config(dir.path(), &EngineConfig::default(), false).unwrap();
    }
}
