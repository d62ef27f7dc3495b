//! Persisted flow logbook.
//!
//! A `FlowDetail` is the durable record of one flow run: one `AtomDetail` per
//! atom carrying its last known state and intention. Details are written as
//! JSON so that an interrupted run can be reloaded into a state store and
//! resumed.

use std::collections::HashMap;
use std::path::Path;

use atomflow_types::atom::{Atom, AtomKind};
use atomflow_types::state::{AtomIntention, AtomState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LogbookError {
    #[error("logbook I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logbook JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate atom detail: '{0}'")]
    DuplicateAtom(String),
}

// ---------------------------------------------------------------------------
// AtomDetail
// ---------------------------------------------------------------------------

/// Last known state and intention of a single atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomDetail {
    /// UUIDv7 assigned when the atom is first recorded.
    pub uuid: Uuid,
    pub name: String,
    pub kind: AtomKind,
    #[serde(default)]
    pub state: AtomState,
    #[serde(default)]
    pub intention: AtomIntention,
    /// When state or intention last changed.
    pub updated_at: DateTime<Utc>,
}

impl AtomDetail {
    /// A fresh PENDING/EXECUTE detail for the atom.
    pub fn new(atom: &Atom) -> Self {
        Self {
            uuid: Uuid::now_v7(),
            name: atom.name.clone(),
            kind: atom.kind,
            state: AtomState::default(),
            intention: AtomIntention::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn atom(&self) -> Atom {
        Atom::new(self.name.clone(), self.kind)
    }

    pub fn put_state(&mut self, state: AtomState) {
        self.state = state;
        self.touch();
    }

    pub fn put_intention(&mut self, intention: AtomIntention) {
        self.intention = intention;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// FlowDetail
// ---------------------------------------------------------------------------

/// Durable record of one flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDetail {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub atoms: Vec<AtomDetail>,
    /// Free-form engine metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, serde_json::Value>,
}

impl FlowDetail {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::now_v7(),
            name: name.into(),
            atoms: Vec::new(),
            meta: HashMap::new(),
        }
    }

    /// Add an atom detail. Names are unique within a flow.
    pub fn add(&mut self, detail: AtomDetail) -> Result<(), LogbookError> {
        if self.find(&detail.name).is_some() {
            return Err(LogbookError::DuplicateAtom(detail.name));
        }
        self.atoms.push(detail);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&AtomDetail> {
        self.atoms.iter().find(|d| d.name == name)
    }

    /// Fold another record of the same flow into this one.
    ///
    /// Atoms only known to `other` are added; for atoms known to both, the
    /// more recently updated detail wins.
    pub fn merge(&mut self, other: &FlowDetail) {
        for theirs in &other.atoms {
            match self.atoms.iter_mut().find(|d| d.name == theirs.name) {
                Some(ours) if theirs.updated_at > ours.updated_at => *ours = theirs.clone(),
                Some(_) => {}
                None => self.atoms.push(theirs.clone()),
            }
        }
        for (key, value) in &other.meta {
            self.meta.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn to_json(&self) -> Result<String, LogbookError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a flow detail, rejecting duplicate atom names.
    pub fn from_json(json: &str) -> Result<Self, LogbookError> {
        let flow: FlowDetail = serde_json::from_str(json)?;
        let mut seen = std::collections::HashSet::new();
        for detail in &flow.atoms {
            if !seen.insert(detail.name.as_str()) {
                return Err(LogbookError::DuplicateAtom(detail.name.clone()));
            }
        }
        Ok(flow)
    }

    pub fn load(path: &Path) -> Result<Self, LogbookError> {
        let json = std::fs::read_to_string(path)?;
        let flow = Self::from_json(&json)?;
        tracing::debug!(?path, flow = %flow.name, atoms = flow.atoms.len(), "loaded flow detail");
        Ok(flow)
    }

    pub fn save(&self, path: &Path) -> Result<(), LogbookError> {
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(?path, flow = %self.name, atoms = self.atoms.len(), "saved flow detail");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
