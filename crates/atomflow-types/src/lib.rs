//! Shared domain types for Atomflow.
//!
//! This crate contains the core domain types used across the Atomflow
//! workspace: atoms, their persisted states and intentions, configuration,
//! and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, toml, thiserror.

pub mod atom;
pub mod config;
pub mod error;
pub mod state;
