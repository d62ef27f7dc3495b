//! Atom domain types.
//!
//! An atom is a named unit of work and a node in the execution graph. Atoms
//! come in two closed variants: tasks, which do real work, and retry
//! controllers, which govern the compensation policy of the region of the
//! graph they own.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The variant of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    /// An atom that performs actual work.
    Task,
    /// An atom that governs the retry/revert policy of a bounded subgraph.
    Retry,
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomKind::Task => write!(f, "task"),
            AtomKind::Retry => write!(f, "retry"),
        }
    }
}

/// A named node in the execution graph.
///
/// The name is the identity of the atom: it is unique within a graph, stable
/// across runs, and used as the lookup key into the state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    /// Unique atom name.
    pub name: String,
    /// Task or retry controller.
    pub kind: AtomKind,
}

impl Atom {
    /// Create an atom of the given kind.
    pub fn new(name: impl Into<String>, kind: AtomKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a task atom.
    pub fn task(name: impl Into<String>) -> Self {
        Self::new(name, AtomKind::Task)
    }

    /// Create a retry controller atom.
    pub fn retry(name: impl Into<String>) -> Self {
        Self::new(name, AtomKind::Retry)
    }

    /// Whether this atom is a retry controller.
    pub fn is_retry(&self) -> bool {
        self.kind == AtomKind::Retry
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}
