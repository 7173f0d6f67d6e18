//! CLI command definitions for the `weft` binary.
//!
//! Uses clap derive macros. Commands follow a noun-verb pattern
//! (`weft node run`, `weft url check`, `weft config show`).

pub mod config;
pub mod node;
pub mod url;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use weft_types::workflow::NodeKind;

/// Run and inspect Weft workflow nodes.
#[derive(Parser)]
#[command(name = "weft", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans with the OpenTelemetry stdout exporter.
    #[arg(long, global = true, env = "WEFT_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute workflow nodes.
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },

    /// Check URLs against the outbound request guard.
    Url {
        #[command(subcommand)]
        command: UrlCommand,
    },

    /// Inspect engine configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum NodeCommand {
    /// Run a single node and record its output in a fresh execution.
    Run {
        /// Node kind (create_entity, update_entity, delete_entity,
        /// query_entity, http_request, condition).
        #[arg(long)]
        kind: NodeKind,

        /// Path to the node's JSON config, or `-` for stdin.
        #[arg(long)]
        config: PathBuf,

        /// JSON file of entity types and records to seed.
        #[arg(long)]
        entities: Option<PathBuf>,

        /// JSON file holding the trigger context.
        #[arg(long)]
        trigger: Option<PathBuf>,

        /// Node ID recorded in the execution.
        #[arg(long, default_value = "node")]
        id: String,

        /// Human-readable node name.
        #[arg(long)]
        name: Option<String>,

        /// Print the full execution snapshot instead of the node result.
        #[arg(long)]
        snapshot: bool,
    },
}

#[derive(Subcommand)]
pub enum UrlCommand {
    /// Report whether an outbound request to URL would be allowed.
    Check {
        url: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective engine configuration.
    Show,
}

/// Read a file, or stdin when the path is `-`.
pub async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        use tokio::io::AsyncReadExt;
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}
