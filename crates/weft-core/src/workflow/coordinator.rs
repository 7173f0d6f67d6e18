//! Node execution coordinator.
//!
//! Executes a single node by dispatching on its kind and normalizes every
//! outcome into a `NodeExecutionResult`. Strategy errors and panics become
//! FAILED results; nothing escapes to the caller. Deciding what happens to
//! the rest of the graph after a failure belongs to the graph coordinator
//! (see `weft_types::workflow::FailurePolicy`).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::{Map, Value};

use weft_types::workflow::{NodeExecutionResult, NodeKind, StepOutput};

use super::store::{StoreError, WorkflowDataStore};
use super::strategy::{NodeError, StrategyRegistry};

pub struct NodeExecutionCoordinator {
    registry: StrategyRegistry,
}

impl NodeExecutionCoordinator {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Execute one node. Always returns a terminal result.
    #[tracing::instrument(skip_all, fields(node_id = %node_id, kind = %kind))]
    pub async fn execute(
        &self,
        node_id: &str,
        kind: NodeKind,
        config: &Map<String, Value>,
    ) -> NodeExecutionResult {
        let start = Instant::now();

        let outcome = match self.registry.get(kind) {
            None => Err(NodeError::Config(format!(
                "no strategy registered for node kind '{kind}'"
            ))),
            Some(strategy) => AssertUnwindSafe(strategy.execute(config))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(NodeError::Internal(panic_message(panic.as_ref())))),
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                tracing::info!(node_id, %kind, status = "completed", duration_ms, "node finished");
                NodeExecutionResult::completed(node_id, kind, output, duration_ms)
            }
            Err(err) => {
                tracing::warn!(
                    node_id,
                    %kind,
                    status = "failed",
                    duration_ms,
                    error = %err,
                    "node failed"
                );
                NodeExecutionResult::failed(node_id, kind, err.to_string(), duration_ms)
            }
        }
    }

    /// Execute a node and record its step output in `store`.
    ///
    /// A node that already has a recorded output is a contract violation of
    /// the caller and is returned as `StoreError`, not as a node failure.
    pub async fn execute_and_record(
        &self,
        store: &WorkflowDataStore,
        node_id: &str,
        node_name: &str,
        kind: NodeKind,
        config: &Map<String, Value>,
    ) -> Result<NodeExecutionResult, StoreError> {
        if store.has_step_output(node_id) {
            return Err(StoreError::StepAlreadyRecorded {
                node_id: node_id.to_string(),
            });
        }

        let result = self.execute(node_id, kind, config).await;
        store.set_step_output(node_id, StepOutput::from_result(node_name, &result))?;
        Ok(result)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("node strategy panicked: {detail}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
