//! Workflow execution types for Weft.
//!
//! Defines the records a single execution accumulates: immutable run
//! metadata, the run phase, per-node status and step outputs, loop iteration
//! state, and the uniform result shape every node execution produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Run metadata and phase
// ---------------------------------------------------------------------------

/// Immutable facts about one execution, fixed at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// Unique ID of this execution.
    pub execution_id: Uuid,
    /// Workspace that owns the workflow.
    pub workspace_id: Uuid,
    /// Workflow definition being executed.
    pub workflow_id: Uuid,
    /// Version of the workflow definition.
    pub workflow_version: u32,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Create metadata for a new execution starting now.
    pub fn new(workspace_id: Uuid, workflow_id: Uuid, workflow_version: u32) -> Self {
        Self {
            execution_id: Uuid::now_v7(),
            workspace_id,
            workflow_id,
            workflow_version,
            started_at: Utc::now(),
        }
    }
}

/// Execution phase of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Initializing,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// Terminal phases cannot be left.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal phase change.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, next) {
            (Initializing, Running) => true,
            (Initializing, Failed) | (Initializing, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Initializing => "initializing",
            WorkflowState::Running => "running",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
            WorkflowState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What the Graph Coordinator does after a node fails.
///
/// The execution core only reports FAILED results; this policy is carried
/// for the coordinator that owns continuation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop scheduling and mark the whole run failed.
    #[default]
    AbortExecution,
    /// Skip nodes downstream of the failure; independent branches continue.
    SkipDependents,
}

impl FailurePolicy {
    /// The phase the run should move to when a node fails, if any.
    ///
    /// `None` means the run keeps its current phase.
    pub fn on_failure(self, current: WorkflowState) -> Option<WorkflowState> {
        match self {
            FailurePolicy::AbortExecution if !current.is_terminal() => {
                Some(WorkflowState::Failed)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Node kinds and status
// ---------------------------------------------------------------------------

/// The kind of node, selecting the execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    CreateEntity,
    UpdateEntity,
    DeleteEntity,
    QueryEntity,
    HttpRequest,
    Condition,
}

impl NodeKind {
    /// All known kinds, in declaration order.
    pub const ALL: [NodeKind; 6] = [
        NodeKind::CreateEntity,
        NodeKind::UpdateEntity,
        NodeKind::DeleteEntity,
        NodeKind::QueryEntity,
        NodeKind::HttpRequest,
        NodeKind::Condition,
    ];

    /// Control-flow nodes produce a branch decision rather than data.
    pub fn is_control_flow(self) -> bool {
        matches!(self, NodeKind::Condition)
    }

    /// The snake_case name used in configs and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::CreateEntity => "create_entity",
            NodeKind::UpdateEntity => "update_entity",
            NodeKind::DeleteEntity => "delete_entity",
            NodeKind::QueryEntity => "query_entity",
            NodeKind::HttpRequest => "http_request",
            NodeKind::Condition => "condition",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown node kind '{s}'"))
    }
}

/// Lifecycle of a single node: `Pending -> Running -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }

    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Pending, NodeStatus::Running)
                | (NodeStatus::Running, NodeStatus::Completed)
                | (NodeStatus::Running, NodeStatus::Failed)
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Node execution result
// ---------------------------------------------------------------------------

/// Uniform outcome of executing one node, whatever its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub kind: NodeKind,
    /// Always terminal: `Completed` or `Failed`.
    pub status: NodeStatus,
    /// Kind-specific output map on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl NodeExecutionResult {
    pub fn completed(node_id: impl Into<String>, kind: NodeKind, output: Value, duration_ms: u64) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            status: NodeStatus::Completed,
            output: Some(output),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(
        node_id: impl Into<String>,
        kind: NodeKind,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            status: NodeStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }

    /// The branch decision of a completed condition node.
    pub fn condition_result(&self) -> Option<bool> {
        self.output
            .as_ref()
            .and_then(|o| o.get("conditionResult"))
            .and_then(Value::as_bool)
    }
}

// ---------------------------------------------------------------------------
// Step output
// ---------------------------------------------------------------------------

/// Immutable record of one finished node, stored once per node ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    pub node_id: String,
    pub node_name: String,
    pub status: NodeStatus,
    /// Kind-specific payload. For failed nodes: `{"error": "<message>"}`.
    pub output: Value,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepOutput {
    pub fn new(
        node_id: impl Into<String>,
        node_name: impl Into<String>,
        status: NodeStatus,
        output: Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_name: node_name.into(),
            status,
            output,
            completed_at: Utc::now(),
            duration_ms,
        }
    }

    /// Build the stored record for an execution result.
    pub fn from_result(node_name: impl Into<String>, result: &NodeExecutionResult) -> Self {
        let output = match (&result.output, &result.error) {
            (Some(output), _) => output.clone(),
            (None, Some(error)) => json!({ "error": error }),
            (None, None) => Value::Null,
        };
        Self::new(
            result.node_id.clone(),
            node_name,
            result.status,
            output,
            result.duration_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// Loop context
// ---------------------------------------------------------------------------

/// Iteration state of one active loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopContext {
    pub loop_id: String,
    /// Zero-based index of the current iteration.
    pub index: usize,
    /// Item being processed in this iteration.
    pub item: Value,
    /// Total number of items.
    pub total: usize,
}

impl LoopContext {
    pub fn new(loop_id: impl Into<String>, index: usize, item: Value, total: usize) -> Self {
        Self {
            loop_id: loop_id.into(),
            index,
            item,
            total,
        }
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_state_transitions() {
        use WorkflowState::*;
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Initializing.can_transition_to(Failed));
        assert!(!Initializing.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_node_status_machine() {
        use NodeStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_failure_policy() {
        assert_eq!(
            FailurePolicy::AbortExecution.on_failure(WorkflowState::Running),
            Some(WorkflowState::Failed)
        );
        assert_eq!(
            FailurePolicy::AbortExecution.on_failure(WorkflowState::Failed),
            None
        );
        assert_eq!(
            FailurePolicy::SkipDependents.on_failure(WorkflowState::Running),
            None
        );
        assert_eq!(FailurePolicy::default(), FailurePolicy::AbortExecution);
    }

    #[test]
    fn test_node_kind_parse_and_serde() {
        assert_eq!("http_request".parse::<NodeKind>().unwrap(), NodeKind::HttpRequest);
        assert!("teleport".parse::<NodeKind>().is_err());
        assert_eq!(
            serde_json::to_value(NodeKind::DeleteEntity).unwrap(),
            json!("delete_entity")
        );
        for kind in NodeKind::ALL {
            assert_eq!(kind.to_string().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_step_output_from_failed_result() {
        let result = NodeExecutionResult::failed("n1", NodeKind::HttpRequest, "boom", 12);
        let step = StepOutput::from_result("Call API", &result);
        assert_eq!(step.status, NodeStatus::Failed);
        assert_eq!(step.output, json!({ "error": "boom" }));
        assert_eq!(step.duration_ms, 12);
        assert_eq!(step.node_name, "Call API");
    }

    #[test]
    fn test_result_and_step_output_use_camel_case_keys() {
        let result = NodeExecutionResult::completed("n1", NodeKind::Condition, json!({}), 7);
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["nodeId"], json!("n1"));
        assert_eq!(v["durationMs"], json!(7));
        assert!(v.get("duration_ms").is_none());

        let step = StepOutput::from_result("Check", &result);
        let v = serde_json::to_value(&step).unwrap();
        assert_eq!(v["nodeName"], json!("Check"));
        assert!(v["completedAt"].is_string());
        let back: StepOutput = serde_json::from_value(v).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_condition_result_accessor() {
        let result = NodeExecutionResult::completed(
            "c1",
            NodeKind::Condition,
            json!({ "conditionResult": true }),
            1,
        );
        assert_eq!(result.condition_result(), Some(true));
        assert!(result.is_completed());
    }

    #[test]
    fn test_loop_context_is_last() {
        assert!(!LoopContext::new("l", 0, json!(1), 3).is_last());
        assert!(LoopContext::new("l", 2, json!(3), 3).is_last());
    }
}
