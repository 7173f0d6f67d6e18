//! `weft node run`: execute one node inside a fresh execution.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use serde_json::{Map, Value};
use uuid::Uuid;

use weft_core::workflow::coordinator::NodeExecutionCoordinator;
use weft_core::workflow::store::WorkflowDataStore;
use weft_core::workflow::strategy::StrategyRegistry;
use weft_infra::entity::{EntitySeed, InMemoryEntityService};
use weft_infra::http::ReqwestTransport;
use weft_types::config::EngineConfig;
use weft_types::trigger::TriggerContext;
use weft_types::workflow::{
    FailurePolicy, NodeExecutionResult, NodeKind, WorkflowMetadata, WorkflowState,
};

use super::read_input;

/// Inputs of a single-node run.
pub struct RunNode<'a> {
    pub kind: NodeKind,
    pub config: &'a Path,
    pub entities: Option<&'a Path>,
    pub trigger: Option<&'a Path>,
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub snapshot: bool,
}

/// Parse a node config document; it must be a JSON object.
pub fn parse_node_config(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("node config is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("node config must be a JSON object, got {}", type_name(&other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Run the node. Returns whether it completed.
pub async fn run_node(engine: &EngineConfig, args: RunNode<'_>, json: bool) -> Result<bool> {
    let node_config = parse_node_config(&read_input(args.config).await?)?;

    let entities = Arc::new(InMemoryEntityService::new());
    if let Some(path) = args.entities {
        let seeds: Vec<EntitySeed> = serde_json::from_str(&read_input(path).await?)
            .with_context(|| format!("invalid entity seed file {}", path.display()))?;
        let inserted = entities.seed(seeds).context("failed to seed entities")?;
        tracing::info!(inserted, "seeded entities");
    }

    let transport = Arc::new(
        ReqwestTransport::new(&engine.http).context("failed to build HTTP transport")?,
    );
    let registry = StrategyRegistry::with_defaults(entities, transport, engine);
    let coordinator = NodeExecutionCoordinator::new(registry);

    let store = WorkflowDataStore::new(
        WorkflowMetadata::new(Uuid::nil(), Uuid::now_v7(), 1),
        WorkflowState::Initializing,
    );
    if let Some(path) = args.trigger {
        let trigger: TriggerContext = serde_json::from_str(&read_input(path).await?)
            .with_context(|| format!("invalid trigger file {}", path.display()))?;
        store.set_trigger(trigger)?;
    }
    store.transition_state(WorkflowState::Running)?;

    let result = coordinator
        .execute_and_record(
            &store,
            args.id,
            args.name.unwrap_or(args.id),
            args.kind,
            &node_config,
        )
        .await?;

    let next = if result.is_completed() {
        Some(WorkflowState::Completed)
    } else {
        FailurePolicy::default().on_failure(store.state())
    };
    if let Some(next) = next {
        store.transition_state(next)?;
    }

    if args.snapshot {
        println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    } else if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result)?;
    }

    Ok(result.is_completed())
}

fn print_result(result: &NodeExecutionResult) -> Result<()> {
    println!();
    if result.is_completed() {
        println!(
            "  {} {} ({}) completed in {}ms",
            style("✓").green().bold(),
            style(&result.node_id).cyan(),
            result.kind,
            result.duration_ms
        );
    } else {
        println!(
            "  {} {} ({}) failed after {}ms",
            style("✗").red().bold(),
            style(&result.node_id).cyan(),
            result.kind,
            result.duration_ms
        );
    }
    println!();

    if let Some(error) = &result.error {
        println!("  {}", style(error).red());
    }
    if let Some(output) = &result.output {
        for line in serde_json::to_string_pretty(output)?.lines() {
            println!("  {line}");
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_node_config_object() {
        let config = parse_node_config(r#"{"expression": "true"}"#).unwrap();
        assert_eq!(config["expression"], json!("true"));
    }

    #[test]
    fn test_parse_node_config_rejects_non_object() {
        let err = parse_node_config("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("array"));
        assert!(parse_node_config("{oops").is_err());
    }

    #[tokio::test]
    async fn test_run_condition_node() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("node.json");
        tokio::fs::write(&config, r#"{"expression": "n > 1", "context": {"n": 2}}"#)
            .await
            .unwrap();

        let completed = run_node(
            &EngineConfig::default(),
            RunNode {
                kind: NodeKind::Condition,
                config: &config,
                entities: None,
                trigger: None,
                id: "check",
                name: None,
                snapshot: false,
            },
            true,
        )
        .await
        .unwrap();
        assert!(completed);
    }

    #[tokio::test]
    async fn test_run_delete_against_seeded_entities() {
        let dir = tempfile::tempdir().unwrap();
        let type_id = Uuid::now_v7();
        let entity_id = Uuid::now_v7();

        let seeds = dir.path().join("entities.json");
        tokio::fs::write(
            &seeds,
            json!([{
                "entityTypeId": type_id,
                "entities": [{ "id": entity_id, "payload": { "name": "Ada" } }]
            }])
            .to_string(),
        )
        .await
        .unwrap();

        let config = dir.path().join("node.json");
        tokio::fs::write(&config, json!({ "entityId": entity_id }).to_string())
            .await
            .unwrap();

        let seeded = RunNode {
            kind: NodeKind::DeleteEntity,
            config: &config,
            entities: Some(&seeds),
            trigger: None,
            id: "delete",
            name: Some("Delete"),
            snapshot: true,
        };
        assert!(run_node(&EngineConfig::default(), seeded, true).await.unwrap());

        // Without seeding the entity does not exist
        let missing = RunNode {
            kind: NodeKind::DeleteEntity,
            config: &config,
            entities: None,
            trigger: None,
            id: "delete",
            name: None,
            snapshot: false,
        };
        assert!(!run_node(&EngineConfig::default(), missing, true).await.unwrap());
    }
}
