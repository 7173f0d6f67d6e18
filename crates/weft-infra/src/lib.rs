//! Infrastructure layer for Weft.
//!
//! Implements the ports defined in `weft-core`: a reqwest HTTP transport
//! with address filtering at resolution time, an in-memory entity service,
//! and the `config.toml` loader.

pub mod config;
pub mod entity;
pub mod http;
