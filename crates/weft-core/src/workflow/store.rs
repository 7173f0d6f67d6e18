//! Per-execution workflow data store.
//!
//! `WorkflowDataStore` is the single source of truth for one execution's
//! accumulated state. It is shared as `Arc<WorkflowDataStore>` between node
//! executions running on parallel branches and needs no external locking.
//!
//! - Step outputs are write-once: the first `set_step_output` for a node ID
//!   wins and every later write fails with `StoreError::StepAlreadyRecorded`.
//! - The trigger slot is write-once per execution.
//! - Variables and loop contexts are last-write-wins.
//! - Every getter returns an owned copy, never a view into the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use weft_types::trigger::TriggerContext;
use weft_types::workflow::{LoopContext, StepOutput, WorkflowMetadata, WorkflowState};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Contract violations raised by the store. These are caller bugs, not
/// node failures, and are returned rather than swallowed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("step already recorded for node '{node_id}'")]
    StepAlreadyRecorded { node_id: String },

    #[error("trigger already set for this execution")]
    TriggerAlreadySet,

    #[error("invalid workflow state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serializable record of an execution's accumulated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub metadata: WorkflowMetadata,
    pub state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerContext>,
    #[serde(default)]
    pub step_outputs: BTreeMap<String, StepOutput>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub loop_contexts: BTreeMap<String, LoopContext>,
}

// ---------------------------------------------------------------------------
// WorkflowDataStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct WorkflowDataStore {
    metadata: WorkflowMetadata,
    state: Mutex<WorkflowState>,
    step_outputs: DashMap<String, StepOutput>,
    variables: DashMap<String, Value>,
    trigger: OnceLock<TriggerContext>,
    loop_contexts: DashMap<String, LoopContext>,
}

impl WorkflowDataStore {
    /// Create the store for one execution.
    pub fn new(metadata: WorkflowMetadata, initial_state: WorkflowState) -> Self {
        Self {
            metadata,
            state: Mutex::new(initial_state),
            step_outputs: DashMap::new(),
            variables: DashMap::new(),
            trigger: OnceLock::new(),
            loop_contexts: DashMap::new(),
        }
    }

    /// Rebuild a store from a persisted snapshot.
    pub fn from_snapshot(snapshot: ExecutionSnapshot) -> Self {
        let mut store = Self::new(snapshot.metadata, snapshot.state);
        if let Some(trigger) = snapshot.trigger {
            let _ = store.trigger.set(trigger);
        }
        store.step_outputs.extend(snapshot.step_outputs);
        store.variables.extend(snapshot.variables);
        store.loop_contexts.extend(snapshot.loop_contexts);
        store
    }

    pub fn metadata(&self) -> &WorkflowMetadata {
        &self.metadata
    }

    // -- Run phase --

    pub fn state(&self) -> WorkflowState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the run to `next`, returning the previous phase.
    pub fn transition_state(&self, next: WorkflowState) -> Result<WorkflowState, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = *state;
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidStateTransition {
                from: current,
                to: next,
            });
        }
        *state = next;
        tracing::debug!(
            execution_id = %self.metadata.execution_id,
            from = %current,
            to = %next,
            "workflow state transition"
        );
        Ok(current)
    }

    // -- Step outputs (write-once) --

    /// Record a node's output. Fails if the node already has one.
    pub fn set_step_output(
        &self,
        node_id: &str,
        output: StepOutput,
    ) -> Result<(), StoreError> {
        match self.step_outputs.entry(node_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(
                    execution_id = %self.metadata.execution_id,
                    node_id,
                    "rejected duplicate step output"
                );
                Err(StoreError::StepAlreadyRecorded {
                    node_id: node_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(output);
                Ok(())
            }
        }
    }

    pub fn get_step_output(&self, node_id: &str) -> Option<StepOutput> {
        self.step_outputs.get(node_id).map(|entry| entry.value().clone())
    }

    pub fn has_step_output(&self, node_id: &str) -> bool {
        self.step_outputs.contains_key(node_id)
    }

    pub fn get_all_step_outputs(&self) -> HashMap<String, StepOutput> {
        self.step_outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    // -- Variables (last-write-wins) --

    /// Set a variable. `Value::Null` is stored as a real value.
    pub fn set_variable(&self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    /// `None` means never set; `Some(Value::Null)` means explicitly null.
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|entry| entry.value().clone())
    }

    pub fn get_all_variables(&self) -> HashMap<String, Value> {
        self.variables
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    // -- Trigger (write-once) --

    pub fn set_trigger(&self, trigger: TriggerContext) -> Result<(), StoreError> {
        let trigger_type = trigger.trigger_type();
        self.trigger
            .set(trigger)
            .map_err(|_| StoreError::TriggerAlreadySet)?;
        tracing::debug!(
            execution_id = %self.metadata.execution_id,
            trigger_type,
            "trigger set"
        );
        Ok(())
    }

    pub fn get_trigger(&self) -> Option<TriggerContext> {
        self.trigger.get().cloned()
    }

    // -- Loop contexts (last-write-wins) --

    pub fn set_loop_context(&self, loop_id: &str, context: LoopContext) {
        self.loop_contexts.insert(loop_id.to_string(), context);
    }

    pub fn get_loop_context(&self, loop_id: &str) -> Option<LoopContext> {
        self.loop_contexts.get(loop_id).map(|entry| entry.value().clone())
    }

    pub fn get_all_loop_contexts(&self) -> HashMap<String, LoopContext> {
        self.loop_contexts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Drop a finished loop's context, returning it if present.
    pub fn clear_loop_context(&self, loop_id: &str) -> Option<LoopContext> {
        self.loop_contexts.remove(loop_id).map(|(_, ctx)| ctx)
    }

    // -- Views --

    /// Build the JSON object an input resolver evaluates templates against.
    ///
    /// Shape:
    /// ```json
    /// {
    ///   "workflow": { "executionId": "...", "workflowId": "...", ... },
    ///   "steps": { "<node_id>": { "output": <value>, "status": "...", ... } },
    ///   "variables": { ... },
    ///   "trigger": <trigger map or null>,
    ///   "loops": { "<loop_id>": { "index": 0, "item": <value>, "total": 3 } }
    /// }
    /// ```
    pub fn template_context(&self) -> Value {
        let mut steps = Map::new();
        for entry in self.step_outputs.iter() {
            let step = entry.value();
            steps.insert(
                entry.key().clone(),
                json!({
                    "output": step.output,
                    "status": step.status,
                    "nodeName": step.node_name,
                    "durationMs": step.duration_ms,
                }),
            );
        }

        let mut loops = Map::new();
        for entry in self.loop_contexts.iter() {
            let ctx = entry.value();
            loops.insert(
                entry.key().clone(),
                json!({ "index": ctx.index, "item": ctx.item, "total": ctx.total }),
            );
        }

        let variables: Map<String, Value> = self
            .variables
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        json!({
            "workflow": {
                "executionId": self.metadata.execution_id.to_string(),
                "workspaceId": self.metadata.workspace_id.to_string(),
                "workflowId": self.metadata.workflow_id.to_string(),
                "workflowVersion": self.metadata.workflow_version,
                "startedAt": self.metadata.started_at.to_rfc3339(),
                "state": self.state(),
            },
            "steps": steps,
            "variables": variables,
            "trigger": self
                .trigger
                .get()
                .map(|t| Value::Object(t.to_map()))
                .unwrap_or(Value::Null),
            "loops": loops,
        })
    }

    /// Capture the current state for persistence.
    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            metadata: self.metadata.clone(),
            state: self.state(),
            trigger: self.get_trigger(),
            step_outputs: self.get_all_step_outputs().into_iter().collect(),
            variables: self.get_all_variables().into_iter().collect(),
            loop_contexts: self.get_all_loop_contexts().into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use uuid::Uuid;
    use weft_types::trigger::{FunctionTrigger, WebhookTrigger};
    use weft_types::workflow::NodeStatus;

    fn test_store() -> WorkflowDataStore {
        WorkflowDataStore::new(
            WorkflowMetadata::new(Uuid::now_v7(), Uuid::now_v7(), 3),
            WorkflowState::Initializing,
        )
    }

    fn step(node_id: &str, payload: Value) -> StepOutput {
        StepOutput::new(node_id, "Step", NodeStatus::Completed, payload, 5)
    }

    fn function_trigger(n: i64) -> TriggerContext {
        TriggerContext::Function(FunctionTrigger {
            arguments: json!({ "n": n }).as_object().cloned().unwrap(),
        })
    }

    // -----------------------------------------------------------------------
    // Step outputs
    // -----------------------------------------------------------------------

    #[test]
    fn test_step_output_first_write_wins() {
        let store = test_store();
        let first = step("fetch", json!({ "v": 1 }));
        store.set_step_output("fetch", first.clone()).unwrap();
        assert_eq!(store.get_step_output("fetch"), Some(first.clone()));

        let err = store
            .set_step_output("fetch", step("fetch", json!({ "v": 2 })))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::StepAlreadyRecorded {
                node_id: "fetch".to_string()
            }
        );
        assert!(err.to_string().contains("already recorded"));
        assert_eq!(store.get_step_output("fetch"), Some(first));
    }

    #[test]
    fn test_step_output_absent() {
        let store = test_store();
        assert_eq!(store.get_step_output("missing"), None);
        assert!(!store.has_step_output("missing"));
    }

    #[test]
    fn test_all_step_outputs_is_detached_copy() {
        let store = test_store();
        store.set_step_output("a", step("a", json!(1))).unwrap();

        let mut copy = store.get_all_step_outputs();
        copy.insert("b".to_string(), step("b", json!(2)));
        copy.get_mut("a").unwrap().output = json!("tampered");

        let fresh = store.get_all_step_outputs();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh["a"].output, json!(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_node_exactly_one_wins() {
        let store = Arc::new(test_store());
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_step_output("node1", step("node1", json!({ "writer": i })))
            }));
        }

        let mut ok = 0;
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::StepAlreadyRecorded { .. }) => dup += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(dup, 9);
        assert_eq!(store.get_all_step_outputs().len(), 1);
    }

    #[test]
    fn test_concurrent_same_node_os_threads() {
        let store = Arc::new(test_store());
        let results: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.set_step_output("node1", step("node1", json!(i)))
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let winner = store.get_step_output("node1").unwrap();
        assert!(winner.output.as_i64().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_nodes_all_succeed() {
        let store = Arc::new(test_store());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("node-{i}");
                store.set_step_output(&id, step(&id, json!(i)))
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get_all_step_outputs().len(), 32);
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    #[test]
    fn test_variable_last_write_wins_and_null() {
        let store = test_store();
        assert_eq!(store.get_variable("x"), None);

        store.set_variable("x", json!(1));
        store.set_variable("x", json!("two"));
        assert_eq!(store.get_variable("x"), Some(json!("two")));

        store.set_variable("x", Value::Null);
        assert_eq!(store.get_variable("x"), Some(Value::Null));
    }

    #[test]
    fn test_all_variables_is_detached_copy() {
        let store = test_store();
        store.set_variable("k", json!("v"));
        let mut copy = store.get_all_variables();
        copy.insert("k".to_string(), json!("changed"));
        copy.insert("other".to_string(), json!(true));
        assert_eq!(store.get_all_variables().len(), 1);
        assert_eq!(store.get_variable("k"), Some(json!("v")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_variable_writes_observe_written_value() {
        let store = Arc::new(test_store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_variable("counter", json!(i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let value = store.get_variable("counter").unwrap().as_i64().unwrap();
        assert!((0..20).contains(&value));
    }

    // -----------------------------------------------------------------------
    // Trigger
    // -----------------------------------------------------------------------

    #[test]
    fn test_trigger_set_once() {
        let store = test_store();
        assert_eq!(store.get_trigger(), None);
        store.set_trigger(function_trigger(1)).unwrap();
        let err = store.set_trigger(function_trigger(2)).unwrap_err();
        assert_eq!(err, StoreError::TriggerAlreadySet);
        assert_eq!(store.get_trigger(), Some(function_trigger(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_trigger_exactly_one() {
        let store = Arc::new(test_store());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_trigger(function_trigger(i)).map(|_| i)
            }));
        }
        let mut winners = Vec::new();
        for handle in handles {
            if let Ok(i) = handle.await.unwrap() {
                winners.push(i);
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(store.get_trigger(), Some(function_trigger(winners[0])));
    }

    // -----------------------------------------------------------------------
    // Loop contexts
    // -----------------------------------------------------------------------

    #[test]
    fn test_loop_context_overwrite_and_clear() {
        let store = test_store();
        store.set_loop_context("items", LoopContext::new("items", 0, json!("a"), 2));
        store.set_loop_context("items", LoopContext::new("items", 1, json!("b"), 2));

        let ctx = store.get_loop_context("items").unwrap();
        assert_eq!(ctx.index, 1);
        assert_eq!(ctx.item, json!("b"));
        assert!(ctx.is_last());

        assert_eq!(store.get_all_loop_contexts().len(), 1);
        assert!(store.clear_loop_context("items").is_some());
        assert_eq!(store.get_loop_context("items"), None);
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    #[test]
    fn test_state_transitions_enforced() {
        let store = test_store();
        assert_eq!(store.state(), WorkflowState::Initializing);
        assert_eq!(
            store.transition_state(WorkflowState::Running).unwrap(),
            WorkflowState::Initializing
        );
        store.transition_state(WorkflowState::Completed).unwrap();

        let err = store.transition_state(WorkflowState::Running).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidStateTransition {
                from: WorkflowState::Completed,
                to: WorkflowState::Running,
            }
        );
        assert_eq!(store.state(), WorkflowState::Completed);
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    #[test]
    fn test_template_context_shape() {
        let store = test_store();
        store.set_step_output("fetch", step("fetch", json!({ "count": 3 }))).unwrap();
        store.set_variable("region", json!("eu"));
        store.set_variable("empty", Value::Null);
        store
            .set_trigger(TriggerContext::Webhook(WebhookTrigger::default()))
            .unwrap();
        store.set_loop_context("rows", LoopContext::new("rows", 0, json!({ "id": 7 }), 4));

        let ctx = store.template_context();
        assert_eq!(ctx["steps"]["fetch"]["output"]["count"], json!(3));
        assert_eq!(ctx["steps"]["fetch"]["status"], json!("completed"));
        assert_eq!(ctx["variables"]["region"], json!("eu"));
        assert_eq!(ctx["variables"]["empty"], Value::Null);
        assert!(ctx["variables"].as_object().unwrap().contains_key("empty"));
        assert_eq!(ctx["trigger"]["triggerType"], json!("webhook"));
        assert_eq!(ctx["loops"]["rows"]["item"]["id"], json!(7));
        assert_eq!(ctx["workflow"]["workflowVersion"], json!(3));
        assert_eq!(ctx["workflow"]["state"], json!("initializing"));
    }

    #[test]
    fn test_template_context_without_trigger_is_null() {
        let store = test_store();
        assert_eq!(store.template_context()["trigger"], Value::Null);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_write_once() {
        let store = test_store();
        store.set_step_output("a", step("a", json!("done"))).unwrap();
        store.set_variable("v", json!(42));
        store.set_trigger(function_trigger(9)).unwrap();

        let json = serde_json::to_value(store.snapshot()).unwrap();
        let snapshot: ExecutionSnapshot = serde_json::from_value(json).unwrap();
        let restored = WorkflowDataStore::from_snapshot(snapshot);

        assert_eq!(restored.metadata(), store.metadata());
        assert_eq!(restored.get_variable("v"), Some(json!(42)));
        assert_eq!(restored.get_trigger(), Some(function_trigger(9)));
        assert!(restored.set_step_output("a", step("a", json!("again"))).is_err());
        assert_eq!(restored.set_trigger(function_trigger(1)), Err(StoreError::TriggerAlreadySet));
    }
}
