//! Execution core for Weft workflows.
//!
//! This crate owns the per-execution data store, the node execution
//! coordinator and its strategies, and the "ports" (traits) for the entity
//! service and outbound HTTP transport. It depends only on `weft-types` --
//! never on `weft-infra` or any network client.

pub mod workflow;
