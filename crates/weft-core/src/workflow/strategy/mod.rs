//! Node strategies and the registry that dispatches to them.
//!
//! A strategy turns a node's JSON configuration into a JSON output map or a
//! [`NodeError`]. Strategies never build `NodeExecutionResult` themselves;
//! the coordinator owns timing and status normalization.

pub mod condition;
pub mod entity;
pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use weft_types::config::EngineConfig;
use weft_types::entity::EntityError;
use weft_types::workflow::NodeKind;

use super::expression::ExpressionError;
use super::guard::GuardError;
use super::ports::{BoxFuture, EntityServiceDyn, HttpTransportDyn};

pub use condition::ConditionStrategy;
pub use entity::EntityStrategy;
pub use http::HttpStrategy;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reasons a node fails. Every variant becomes a FAILED result.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("invalid node configuration: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request blocked by SSRF protection: {0}")]
    Ssrf(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP request returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("HTTP request timed out after {0}s")]
    Timeout(u64),

    #[error("expression did not evaluate to a boolean: got {0}")]
    NotBoolean(Value),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EntityError> for NodeError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::NotFound(id) => NodeError::NotFound(format!("entity {id}")),
            EntityError::Validation(msg) => NodeError::Validation(msg),
            EntityError::PermissionDenied(msg) => NodeError::PermissionDenied(msg),
            EntityError::Storage(msg) => NodeError::Internal(msg),
        }
    }
}

impl From<ExpressionError> for NodeError {
    fn from(err: ExpressionError) -> Self {
        match err {
            ExpressionError::NotBoolean { result } => NodeError::NotBoolean(result),
            other => NodeError::Expression(other.to_string()),
        }
    }
}

impl From<GuardError> for NodeError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::InvalidUrl { .. } | GuardError::MissingHost => {
                NodeError::Config(err.to_string())
            }
            _ => NodeError::Ssrf(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy trait and registry
// ---------------------------------------------------------------------------

/// Executes nodes of one kind.
pub trait NodeStrategy: Send + Sync {
    fn kind(&self) -> NodeKind;

    fn execute<'a>(
        &'a self,
        config: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, NodeError>>;
}

/// Maps node kinds to their strategies.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<NodeKind, Arc<dyn NodeStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in strategies wired to the given ports.
    pub fn with_defaults(
        entities: Arc<dyn EntityServiceDyn>,
        transport: Arc<dyn HttpTransportDyn>,
        config: &EngineConfig,
    ) -> Self {
        let mut registry = Self::new();
        for strategy in EntityStrategy::all(entities.clone(), config.entity.clone()) {
            registry.register(Arc::new(strategy));
        }
        registry.register(Arc::new(HttpStrategy::new(transport, config.http.clone())));
        registry.register(Arc::new(ConditionStrategy::new(entities)));
        registry
    }

    /// Register a strategy under its own kind, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn NodeStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.strategies.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

pub(crate) fn required_str<'a>(
    config: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, NodeError> {
    match config.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(NodeError::Config(format!("'{key}' must not be empty"))),
        Some(_) => Err(NodeError::Config(format!("'{key}' must be a string"))),
        None => Err(NodeError::Config(format!("missing required field '{key}'"))),
    }
}

pub(crate) fn required_uuid(config: &Map<String, Value>, key: &str) -> Result<Uuid, NodeError> {
    let raw = required_str(config, key)?;
    Uuid::parse_str(raw)
        .map_err(|e| NodeError::Config(format!("'{key}' is not a valid UUID: {e}")))
}

pub(crate) fn optional_uuid(
    config: &Map<String, Value>,
    key: &str,
) -> Result<Option<Uuid>, NodeError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_uuid(config, key).map(Some),
    }
}

/// An object field; absent or null yields an empty map.
pub(crate) fn optional_object(
    config: &Map<String, Value>,
    key: &str,
) -> Result<Map<String, Value>, NodeError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(NodeError::Config(format!("'{key}' must be an object"))),
    }
}

pub(crate) fn required_object(
    config: &Map<String, Value>,
    key: &str,
) -> Result<Map<String, Value>, NodeError> {
    match config.get(key) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(NodeError::Config(format!("'{key}' must be an object"))),
        None => Err(NodeError::Config(format!("missing required field '{key}'"))),
    }
}

pub(crate) fn optional_bool(
    config: &Map<String, Value>,
    key: &str,
    default: bool,
) -> Result<bool, NodeError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(NodeError::Config(format!("'{key}' must be a boolean"))),
    }
}

pub(crate) fn optional_u64(config: &Map<String, Value>, key: &str) -> Result<Option<u64>, NodeError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| NodeError::Config(format!("'{key}' must be a non-negative integer"))),
    }
}

// ---------------------------------------------------------------------------
// Test fakes
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
