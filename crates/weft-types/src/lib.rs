//! Shared domain types for Weft.
//!
//! This crate contains the value types that flow through a workflow
//! execution: run metadata and phase, step outputs, trigger contexts, loop
//! state, node kinds and results, entities, and engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod entity;
pub mod trigger;
pub mod workflow;
