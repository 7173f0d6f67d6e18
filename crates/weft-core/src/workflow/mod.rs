//! Workflow execution core: shared run state and single-node execution.
//!
//! - `store` -- concurrency-safe per-execution data store
//! - `trigger` -- trigger construction and schedule helpers
//! - `expression` -- JEXL evaluator for condition nodes
//! - `guard` -- outbound target validation and header redaction
//! - `ports` -- entity service and HTTP transport traits
//! - `strategy` -- per-kind node strategies and the strategy registry
//! - `coordinator` -- execute-and-normalize wrapper around strategies

pub mod coordinator;
pub mod expression;
pub mod guard;
pub mod ports;
pub mod store;
pub mod strategy;
pub mod trigger;
