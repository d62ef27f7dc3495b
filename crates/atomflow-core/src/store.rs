//! State store trait definition.
//!
//! Defines the read interface for per-atom states and intentions. The
//! infrastructure layer (atomflow-infra) implements this trait; the analyzer
//! never depends on any specific storage technology.

use std::collections::HashMap;
use std::sync::Arc;

use atomflow_types::error::StoreError;
use atomflow_types::state::{AtomIntention, AtomState};

/// Read-only view of the externally persisted atom table.
///
/// Reads are synchronous from the caller's point of view: they return a
/// value or fail, they never suspend. Unknown names fail with
/// `StoreError::NotFound` rather than falling back to a default state.
pub trait StateStore: Send + Sync {
    /// Current lifecycle state of the named atom.
    fn get_atom_state(&self, name: &str) -> Result<AtomState, StoreError>;

    /// Current intention of the named atom.
    fn get_atom_intention(&self, name: &str) -> Result<AtomIntention, StoreError>;

    /// Bulk form of the two lookups above, keyed by atom name.
    ///
    /// Must be equivalent to repeated single lookups. The default does
    /// exactly that; backends override it to answer in one round trip.
    fn get_atoms_states(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, (AtomState, AtomIntention)>, StoreError> {
        names
            .iter()
            .map(|name| {
                let state = self.get_atom_state(name)?;
                let intention = self.get_atom_intention(name)?;
                Ok(((*name).to_string(), (state, intention)))
            })
            .collect()
    }
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn get_atom_state(&self, name: &str) -> Result<AtomState, StoreError> {
        (**self).get_atom_state(name)
    }

    fn get_atom_intention(&self, name: &str) -> Result<AtomIntention, StoreError> {
        (**self).get_atom_intention(name)
    }

    fn get_atoms_states(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, (AtomState, AtomIntention)>, StoreError> {
        (**self).get_atoms_states(names)
    }
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn get_atom_state(&self, name: &str) -> Result<AtomState, StoreError> {
        (**self).get_atom_state(name)
    }

    fn get_atom_intention(&self, name: &str) -> Result<AtomIntention, StoreError> {
        (**self).get_atom_intention(name)
    }

    fn get_atoms_states(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, (AtomState, AtomIntention)>, StoreError> {
        (**self).get_atoms_states(names)
    }
}
