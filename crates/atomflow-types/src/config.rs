//! Configuration types for Atomflow.
//!
//! `AtomflowConfig` represents the `atomflow.toml` that controls graph
//! validation and logging. All fields have sensible defaults, so an empty
//! file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomflowConfig {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

impl AtomflowConfig {
    /// Parse a TOML document, filling omitted fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Execution graph construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Reject cyclic graphs when building (topological sort check).
    #[serde(default = "default_verify_acyclic")]
    pub verify_acyclic: bool,
}

fn default_verify_acyclic() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            verify_acyclic: default_verify_acyclic(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            otel: false,
        }
    }
}
