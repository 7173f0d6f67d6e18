//! `weft url check`: dry-run the outbound request guard.

use anyhow::Result;
use console::style;
use serde_json::json;

use weft_core::workflow::guard::validate_target;
use weft_types::config::EngineConfig;

/// Print the guard verdict for `raw`. Returns whether it is allowed.
pub fn check_url(engine: &EngineConfig, raw: &str, json: bool) -> Result<bool> {
    let verdict = validate_target(raw, engine.http.allow_private_targets);

    if json {
        let report = match &verdict {
            Ok(url) => json!({ "url": raw, "allowed": true, "normalized": url.as_str() }),
            Err(e) => json!({ "url": raw, "allowed": false, "reason": e.to_string() }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &verdict {
            Ok(url) => println!("  {} {} is allowed", style("✓").green().bold(), url),
            Err(e) => println!(
                "  {} {} is blocked: {}",
                style("✗").red().bold(),
                raw,
                style(e).yellow()
            ),
        }
    }

    Ok(verdict.is_ok())
}
