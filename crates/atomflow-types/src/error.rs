use thiserror::Error;

use crate::state::AtomState;

/// Errors from state store operations (used by the `StateStore` trait in
/// atomflow-core and its implementations in atomflow-infra).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("atom not found: '{0}'")]
    NotFound(String),

    #[error("atom '{name}' may not transition from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: AtomState,
        to: AtomState,
    },

    #[error("state store backend error: {0}")]
    Backend(String),
}

/// Errors from parsing persisted state and intention strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseStateError {
    #[error("unknown atom state: '{0}'")]
    UnknownState(String),

    #[error("unknown atom intention: '{0}'")]
    UnknownIntention(String),
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
