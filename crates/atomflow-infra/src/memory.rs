//! Concurrent in-memory state store.
//!
//! `MemoryStateStore` keeps one `AtomDetail` row per atom in a `DashMap`.
//! Rows are copied out on read so no `DashMap` guard outlives a call.
//! State changes made through [`MemoryStateStore::transition`] are checked
//! against a `TransitionValidator` while the row's shard lock is held, so two
//! workers racing to move the same atom cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;

use atomflow_core::analyzer::GraphAnalyzer;
use atomflow_core::graph::ExecutionGraph;
use atomflow_core::store::StateStore;
use atomflow_core::transition::TransitionValidator;
use atomflow_types::atom::Atom;
use atomflow_types::error::StoreError;
use atomflow_types::state::{AtomIntention, AtomState};
use dashmap::DashMap;

use crate::logbook::{AtomDetail, FlowDetail};

/// Shared, clonable atom table. Clones see the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<DashMap<String, AtomDetail>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one PENDING/EXECUTE row per atom of the graph.
    pub fn for_graph(graph: &ExecutionGraph) -> Self {
        let store = Self::new();
        store.register_graph(graph);
        store
    }

    /// A store seeded from a persisted flow record.
    pub fn from_flow_detail(flow: &FlowDetail) -> Self {
        let store = Self::new();
        for detail in &flow.atoms {
            store.inner.insert(detail.name.clone(), detail.clone());
        }
        tracing::debug!(flow = %flow.name, atoms = flow.atoms.len(), "state store restored");
        store
    }

    /// Register an atom with default state and intention.
    ///
    /// Returns `false` and leaves the row untouched if the atom is already
    /// known, which makes registering a resumed flow's graph harmless.
    pub fn register(&self, atom: &Atom) -> bool {
        let mut inserted = false;
        self.inner.entry(atom.name.clone()).or_insert_with(|| {
            inserted = true;
            AtomDetail::new(atom)
        });
        inserted
    }

    /// Register every atom of the graph. Returns how many were new.
    pub fn register_graph(&self, graph: &ExecutionGraph) -> usize {
        graph.atoms().filter(|atom| self.register(atom)).count()
    }

    /// Overwrite the atom's state without consulting any transition table.
    pub fn set_state(&self, name: &str, state: AtomState) -> Result<(), StoreError> {
        let mut row = self.row_mut(name)?;
        tracing::debug!(atom = %name, from = %row.state, to = %state, "state set");
        row.put_state(state);
        Ok(())
    }

    pub fn set_intention(&self, name: &str, intention: AtomIntention) -> Result<(), StoreError> {
        let mut row = self.row_mut(name)?;
        tracing::debug!(atom = %name, %intention, "intention set");
        row.put_intention(intention);
        Ok(())
    }

    /// Set state and intention together under one lock.
    pub fn reset(
        &self,
        name: &str,
        state: AtomState,
        intention: AtomIntention,
    ) -> Result<(), StoreError> {
        let mut row = self.row_mut(name)?;
        tracing::debug!(atom = %name, %state, %intention, "atom reset");
        row.state = state;
        row.put_intention(intention);
        Ok(())
    }

    /// Reset each atom's state and/or intention; `None` leaves that column
    /// alone. Returns the atoms that were touched.
    pub fn reset_nodes<'g>(
        &self,
        atoms: impl IntoIterator<Item = &'g Atom>,
        state: Option<AtomState>,
        intention: Option<AtomIntention>,
    ) -> Result<Vec<&'g Atom>, StoreError> {
        if state.is_none() && intention.is_none() {
            return Ok(Vec::new());
        }
        let mut tweaked = Vec::new();
        for atom in atoms {
            let mut row = self.row_mut(&atom.name)?;
            if let Some(state) = state {
                row.put_state(state);
            }
            if let Some(intention) = intention {
                row.put_intention(intention);
            }
            tweaked.push(atom);
        }
        tracing::debug!(
            count = tweaked.len(),
            state = ?state,
            intention = ?intention,
            "atoms reset"
        );
        Ok(tweaked)
    }

    /// Reset every atom of the analyzed graph.
    pub fn reset_all<'g, S, V>(
        &self,
        analyzer: &GraphAnalyzer<'g, S, V>,
        state: Option<AtomState>,
        intention: Option<AtomIntention>,
    ) -> Result<Vec<&'g Atom>, StoreError>
    where
        S: StateStore,
        V: TransitionValidator,
    {
        self.reset_nodes(analyzer.iterate_all_nodes(), state, intention)
    }

    /// Reset everything the retry controller governs, the controller
    /// itself excluded.
    pub fn reset_subgraph<'g, S, V>(
        &self,
        analyzer: &GraphAnalyzer<'g, S, V>,
        controller: &Atom,
        state: Option<AtomState>,
        intention: Option<AtomIntention>,
    ) -> Result<Vec<&'g Atom>, StoreError>
    where
        S: StateStore,
        V: TransitionValidator,
    {
        self.reset_nodes(analyzer.iterate_subgraph(controller), state, intention)
    }

    /// Prepare a retry controller's subflow for another attempt: the
    /// controller is set to EXECUTE and its subgraph to PENDING/EXECUTE.
    pub fn retry_subflow<'g, S, V>(
        &self,
        analyzer: &GraphAnalyzer<'g, S, V>,
        controller: &Atom,
    ) -> Result<Vec<&'g Atom>, StoreError>
    where
        S: StateStore,
        V: TransitionValidator,
    {
        self.set_intention(&controller.name, AtomIntention::Execute)?;
        self.reset_subgraph(
            analyzer,
            controller,
            Some(AtomState::Pending),
            Some(AtomIntention::Execute),
        )
    }

    /// Move the atom to `to` if the validator allows it from its current
    /// state. Returns the state it left.
    ///
    /// Check and write happen under the row lock, so of several concurrent
    /// callers attempting the same move exactly one observes success.
    pub fn transition<V>(
        &self,
        name: &str,
        to: AtomState,
        validator: &V,
    ) -> Result<AtomState, StoreError>
    where
        V: TransitionValidator + ?Sized,
    {
        let mut row = self.row_mut(name)?;
        let from = row.state;
        if !validator.is_valid_transition(from, to) {
            tracing::warn!(atom = %name, %from, %to, "transition rejected");
            return Err(StoreError::InvalidTransition {
                name: name.to_string(),
                from,
                to,
            });
        }
        row.put_state(to);
        tracing::debug!(atom = %name, %from, %to, "atom transitioned");
        Ok(from)
    }

    /// Copy of the atom's row.
    pub fn detail(&self, name: &str) -> Option<AtomDetail> {
        self.inner.get(name).map(|r| r.value().clone())
    }

    /// All rows, ordered by atom name.
    pub fn snapshot(&self) -> Vec<AtomDetail> {
        let mut rows: Vec<AtomDetail> = self.inner.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn row_mut(
        &self,
        name: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, AtomDetail>, StoreError> {
        self.inner
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

impl StateStore for MemoryStateStore {
    fn get_atom_state(&self, name: &str) -> Result<AtomState, StoreError> {
        self.inner
            .get(name)
            .map(|r| r.state)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn get_atom_intention(&self, name: &str) -> Result<AtomIntention, StoreError> {
        self.inner
            .get(name)
            .map(|r| r.intention)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Reads state and intention from the same row guard, so each pair is
    /// consistent even while writers are active.
    fn get_atoms_states(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, (AtomState, AtomIntention)>, StoreError> {
        let mut rows = HashMap::with_capacity(names.len());
        for name in names {
            let row = self
                .inner
                .get(*name)
                .ok_or_else(|| StoreError::NotFound((*name).to_string()))?;
            rows.insert((*name).to_string(), (row.state, row.intention));
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
