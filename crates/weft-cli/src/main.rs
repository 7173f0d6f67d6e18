//! Weft command-line entry point.
//!
//! Binary name: `weft`
//!
//! Parses CLI arguments, sets up tracing, loads the engine configuration,
//! then dispatches to the command handler.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ConfigCommand, NodeCommand, UrlCommand};
use weft_infra::config::{load_engine_config, resolve_data_dir};
use weft_observe::tracing_setup::{
    LogFormat, TracingOptions, init_tracing, shutdown_tracing, verbosity_filter,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: verbosity_filter(cli.quiet, cli.verbose).to_string(),
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "weft", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let data_dir = resolve_data_dir();
    let engine = load_engine_config(&data_dir).await;

    let ok = match cli.command {
        Commands::Node { command } => match command {
            NodeCommand::Run {
                kind,
                config,
                entities,
                trigger,
                id,
                name,
                snapshot,
            } => {
                cli::node::run_node(
                    &engine,
                    cli::node::RunNode {
                        kind,
                        config: &config,
                        entities: entities.as_deref(),
                        trigger: trigger.as_deref(),
                        id: &id,
                        name: name.as_deref(),
                        snapshot,
                    },
                    cli.json,
                )
                .await?
            }
        },

        Commands::Url { command } => match command {
            UrlCommand::Check { url } => cli::url::check_url(&engine, &url, cli.json)?,
        },

        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                cli::config::show_config(&data_dir, &engine, cli.json)?;
                true
            }
        },

        Commands::Completions { .. } => true,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
