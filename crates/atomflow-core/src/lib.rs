//! Readiness analysis and port definitions for Atomflow.
//!
//! This crate decides which atoms of an execution graph may start executing
//! or start reverting, given the states and intentions held by an external
//! state store. It defines the "ports" (the `StateStore` and
//! `TransitionValidator` traits) that the infrastructure layer implements and
//! never performs I/O or mutates state itself.
//!
//! - `graph` -- immutable execution graph and its builder
//! - `store` -- state store port
//! - `transition` -- transition validity policy
//! - `analyzer` -- readiness predicates, next-node resolution, traversal

pub mod analyzer;
pub mod graph;
pub mod store;
pub mod transition;

pub use analyzer::GraphAnalyzer;
pub use graph::{ExecutionGraph, GraphBuilder, GraphError, Subgraph};
pub use store::StateStore;
pub use transition::{DefaultTransitions, TransitionValidator};
