//! Readiness analysis over an execution graph.
//!
//! `GraphAnalyzer` combines the graph topology with the states and intentions
//! held by a `StateStore` to answer which atoms may start executing or start
//! reverting right now. Every query is a fresh read of the store: nothing is
//! cached between calls, so answers can go stale as soon as the store
//! changes. Callers treat the results as candidates and rely on the store's
//! guarded transitions to avoid dispatching an atom twice.
//!
//! # Pivot dispatch
//!
//! | pivot state | pivot intention | next nodes |
//! |---|---|---|
//! | SUCCESS  | REVERT  | the pivot itself |
//! | SUCCESS  | EXECUTE | successors ready for execute |
//! | SUCCESS  | RETRY   | none |
//! | REVERTED | any     | predecessors ready for revert |
//! | FAILURE  | any     | whole-graph revert scan |
//! | other    | any     | none |

use atomflow_types::atom::Atom;
use atomflow_types::error::StoreError;
use atomflow_types::state::{AtomIntention, AtomState};

use crate::graph::{ExecutionGraph, Subgraph};
use crate::store::StateStore;
use crate::transition::{DefaultTransitions, TransitionValidator};

/// Per-session readiness analyzer.
///
/// Borrows the graph and the store for the duration of the session and owns
/// no mutable data of its own.
pub struct GraphAnalyzer<'a, S, V = DefaultTransitions> {
    graph: &'a ExecutionGraph,
    store: &'a S,
    validator: V,
}

impl<'a, S: StateStore> GraphAnalyzer<'a, S> {
    /// Create an analyzer using the default transition table.
    pub fn new(graph: &'a ExecutionGraph, store: &'a S) -> Self {
        Self::with_validator(graph, store, DefaultTransitions)
    }
}

impl<'a, S: StateStore, V: TransitionValidator> GraphAnalyzer<'a, S, V> {
    /// Create an analyzer with a custom transition policy.
    pub fn with_validator(graph: &'a ExecutionGraph, store: &'a S, validator: V) -> Self {
        Self {
            graph,
            store,
            validator,
        }
    }

    pub fn execution_graph(&self) -> &'a ExecutionGraph {
        self.graph
    }

    // -----------------------------------------------------------------------
    // Next-node resolution
    // -----------------------------------------------------------------------

    /// Atoms to act on next.
    ///
    /// Without a pivot, scans the whole graph for execute candidates followed
    /// by revert candidates. With a pivot, dispatches on the pivot's state and
    /// intention (see the module table).
    pub fn get_next_nodes(&self, node: Option<&'a Atom>) -> Result<Vec<&'a Atom>, StoreError> {
        let Some(node) = node else {
            let mut nodes = self.browse_nodes_for_execute(None)?;
            nodes.extend(self.browse_nodes_for_revert(None)?);
            tracing::debug!(count = nodes.len(), "whole-graph scan");
            return Ok(nodes);
        };

        let state = self.get_state(node)?;
        let intention = self.store.get_atom_intention(&node.name)?;
        let next = match state {
            AtomState::Success => match intention {
                AtomIntention::Revert => vec![node],
                AtomIntention::Execute => self.browse_nodes_for_execute(Some(node))?,
                AtomIntention::Retry => Vec::new(),
            },
            AtomState::Reverted => self.browse_nodes_for_revert(Some(node))?,
            AtomState::Failure => self.browse_nodes_for_revert(None)?,
            AtomState::Pending
            | AtomState::Running
            | AtomState::Reverting
            | AtomState::Retrying => Vec::new(),
        };

        tracing::debug!(
            pivot = %node.name,
            %state,
            %intention,
            count = next.len(),
            "resolved next nodes"
        );
        Ok(next)
    }

    /// Execute candidates among the pivot's successors, or the whole graph.
    pub fn browse_nodes_for_execute(
        &self,
        node: Option<&'a Atom>,
    ) -> Result<Vec<&'a Atom>, StoreError> {
        let candidates = match node {
            Some(node) => self.graph.successors(&node.name),
            None => self.graph.atoms().collect(),
        };
        let mut available = Vec::new();
        for atom in candidates {
            if self.is_ready_for_execute(atom)? {
                available.push(atom);
            }
        }
        Ok(available)
    }

    /// Revert candidates among the pivot's predecessors, or the whole graph.
    pub fn browse_nodes_for_revert(
        &self,
        node: Option<&'a Atom>,
    ) -> Result<Vec<&'a Atom>, StoreError> {
        let candidates = match node {
            Some(node) => self.graph.predecessors(&node.name),
            None => self.graph.atoms().collect(),
        };
        let mut available = Vec::new();
        for atom in candidates {
            if self.is_ready_for_revert(atom)? {
                available.push(atom);
            }
        }
        Ok(available)
    }

    // -----------------------------------------------------------------------
    // Readiness predicates
    // -----------------------------------------------------------------------

    /// Whether the atom may begin running.
    ///
    /// Requires a legal transition into RUNNING, an EXECUTE intention, and
    /// every direct predecessor SUCCESS with intention EXECUTE. Predecessors
    /// are read in one bulk lookup.
    pub fn is_ready_for_execute(&self, atom: &Atom) -> Result<bool, StoreError> {
        let state = self.get_state(atom)?;
        let intention = self.store.get_atom_intention(&atom.name)?;
        if !self.validator.is_valid_transition(state, AtomState::Running)
            || intention != AtomIntention::Execute
        {
            return Ok(false);
        }

        let predecessors: Vec<&str> = self
            .graph
            .predecessors(&atom.name)
            .into_iter()
            .map(|a| a.name.as_str())
            .collect();
        if predecessors.is_empty() {
            return Ok(true);
        }

        let states = self.store.get_atoms_states(&predecessors)?;
        let ready = states.values().all(|&(state, intention)| {
            state == AtomState::Success && intention == AtomIntention::Execute
        });
        if !ready {
            tracing::trace!(atom = %atom.name, "predecessors not settled for execute");
        }
        Ok(ready)
    }

    /// Whether the atom may begin reverting.
    ///
    /// Requires a legal transition into REVERTING, a REVERT or RETRY
    /// intention, and every direct successor PENDING or REVERTED.
    pub fn is_ready_for_revert(&self, atom: &Atom) -> Result<bool, StoreError> {
        let state = self.get_state(atom)?;
        let intention = self.store.get_atom_intention(&atom.name)?;
        if !self.validator.is_valid_transition(state, AtomState::Reverting)
            || !matches!(intention, AtomIntention::Revert | AtomIntention::Retry)
        {
            return Ok(false);
        }

        let successors: Vec<&str> = self
            .graph
            .successors(&atom.name)
            .into_iter()
            .map(|a| a.name.as_str())
            .collect();
        if successors.is_empty() {
            return Ok(true);
        }

        let states = self.store.get_atoms_states(&successors)?;
        let ready = states
            .values()
            .all(|&(state, _)| matches!(state, AtomState::Pending | AtomState::Reverted));
        if !ready {
            tracing::trace!(atom = %atom.name, "successors not settled for revert");
        }
        Ok(ready)
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Every atom reachable from the retry controller, depth first, nested
    /// controllers and their atoms included, the controller itself excluded.
    pub fn iterate_subgraph(&self, retry: &Atom) -> Subgraph<'a> {
        self.graph.subgraph(&retry.name)
    }

    /// Retry controllers of the graph, optionally only those currently in
    /// `state`. Without a filter the store is never read.
    pub fn iterate_retries(
        &self,
        state: Option<AtomState>,
    ) -> impl Iterator<Item = Result<&'a Atom, StoreError>> {
        self.graph
            .atoms()
            .filter(|atom| atom.is_retry())
            .filter_map(move |atom| match state {
                None => Some(Ok(atom)),
                Some(wanted) => match self.get_state(atom) {
                    Ok(current) if current == wanted => Some(Ok(atom)),
                    Ok(_) => None,
                    Err(err) => Some(Err(err)),
                },
            })
    }

    pub fn iterate_all_nodes(&self) -> impl Iterator<Item = &'a Atom> {
        self.graph.atoms()
    }

    /// The retry controller governing `atom`, or `None` for top-level atoms.
    pub fn find_atom_retry(&self, atom: &Atom) -> Option<&'a Atom> {
        self.graph.retry_controller_of(&atom.name)
    }

    // -----------------------------------------------------------------------
    // Whole-graph queries
    // -----------------------------------------------------------------------

    /// Whether every atom of the graph is in SUCCESS.
    pub fn is_success(&self) -> Result<bool, StoreError> {
        for atom in self.graph.atoms() {
            if self.get_state(atom)? != AtomState::Success {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Atoms whose last attempt started but never finished (RUNNING or
    /// REVERTING). These are re-dispatched when a flow resumes.
    pub fn unfinished_nodes(&self) -> Result<Vec<&'a Atom>, StoreError> {
        self.nodes_where(|state| state.is_in_flight())
    }

    /// Atoms currently in FAILURE.
    pub fn failed_nodes(&self) -> Result<Vec<&'a Atom>, StoreError> {
        self.nodes_where(|state| state == AtomState::Failure)
    }

    fn nodes_where(
        &self,
        predicate: impl Fn(AtomState) -> bool,
    ) -> Result<Vec<&'a Atom>, StoreError> {
        let mut nodes = Vec::new();
        for atom in self.graph.atoms() {
            if predicate(self.get_state(atom)?) {
                nodes.push(atom);
            }
        }
        Ok(nodes)
    }

    pub fn get_state(&self, atom: &Atom) -> Result<AtomState, StoreError> {
        self.store.get_atom_state(&atom.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::graph::GraphBuilder;

    use atomflow_types::state::AtomIntention::{Execute, Retry, Revert};
    use atomflow_types::state::AtomState::{Failure, Pending, Reverted, Reverting, Running, Success};

    /// In-memory fake with a counter for bulk lookups.
    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<HashMap<String, (AtomState, AtomIntention)>>,
        bulk_reads: AtomicUsize,
    }

    impl FakeStore {
        fn with(rows: &[(&str, AtomState, AtomIntention)]) -> Self {
            let store = Self::default();
            for (name, state, intention) in rows {
                store.set(name, *state, *intention);
            }
            store
        }

        fn set(&self, name: &str, state: AtomState, intention: AtomIntention) {
            self.rows
                .lock()
                .unwrap()
                .insert(name.to_string(), (state, intention));
        }

        fn row(&self, name: &str) -> Result<(AtomState, AtomIntention), StoreError> {
            self.rows
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        }
    }

    impl StateStore for FakeStore {
        fn get_atom_state(&self, name: &str) -> Result<AtomState, StoreError> {
            Ok(self.row(name)?.0)
        }

        fn get_atom_intention(&self, name: &str) -> Result<AtomIntention, StoreError> {
            Ok(self.row(name)?.1)
        }

        fn get_atoms_states(
            &self,
            names: &[&str],
        ) -> Result<HashMap<String, (AtomState, AtomIntention)>, StoreError> {
            self.bulk_reads.fetch_add(1, Ordering::SeqCst);
            names
                .iter()
                .map(|name| Ok((name.to_string(), self.row(name)?)))
                .collect()
        }
    }

    fn chain() -> ExecutionGraph {
        // a -> b -> c
        GraphBuilder::new()
            .add_task("a")
            .add_task("b")
            .add_task("c")
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build()
            .unwrap()
    }

    fn diamond() -> ExecutionGraph {
        // a -> {b, c} -> d
        GraphBuilder::new()
            .add_task("a")
            .add_task("b")
            .add_task("c")
            .add_task("d")
            .add_edge("a", "b")
            .add_edge("a", "c")
            .add_edge("b", "d")
            .add_edge("c", "d")
            .build()
            .unwrap()
    }

    fn names(atoms: &[&Atom]) -> Vec<String> {
        let mut names: Vec<String> = atoms.iter().map(|a| a.name.clone()).collect();
        names.sort();
        names
    }

    // -----------------------------------------------------------------------
    // Whole-graph scans
    // -----------------------------------------------------------------------

    #[test]
    fn test_linear_chain_only_next_step_is_ready() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert_eq!(names(&analyzer.get_next_nodes(None).unwrap()), vec!["b"]);
    }

    #[test]
    fn test_fresh_graph_seeds_roots() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Pending, Execute),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
            ("d", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert_eq!(names(&analyzer.get_next_nodes(None).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_whole_graph_scan_lists_execute_before_revert() {
        // Two independent atoms: one waiting to run, one waiting to revert.
        let graph = GraphBuilder::new()
            .add_task("undo-me")
            .add_task("run-me")
            .build()
            .unwrap();
        let store = FakeStore::with(&[("undo-me", Success, Revert), ("run-me", Pending, Execute)]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let next: Vec<&str> = analyzer
            .get_next_nodes(None)
            .unwrap()
            .into_iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(next, vec!["run-me", "undo-me"]);
    }

    // -----------------------------------------------------------------------
    // Pivot dispatch
    // -----------------------------------------------------------------------

    #[test]
    fn test_success_execute_pivot_browses_successors() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
            ("d", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let pivot = graph.atom("a").unwrap();
        assert_eq!(names(&analyzer.get_next_nodes(Some(pivot)).unwrap()), vec!["b", "c"]);
    }

    #[test]
    fn test_join_waits_for_every_predecessor() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Success, Execute),
            ("c", Running, Execute),
            ("d", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let b = graph.atom("b").unwrap();
        assert!(analyzer.get_next_nodes(Some(b)).unwrap().is_empty());

        store.set("c", Success, Execute);
        let c = graph.atom("c").unwrap();
        assert_eq!(names(&analyzer.get_next_nodes(Some(c)).unwrap()), vec!["d"]);
    }

    #[test]
    fn test_success_revert_pivot_hands_itself_back() {
        let graph = chain();
        // Neighbour states would block a revert; the pivot is returned anyway.
        let store = FakeStore::with(&[
            ("a", Running, Execute),
            ("b", Success, Revert),
            ("c", Running, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let b = graph.atom("b").unwrap();
        assert_eq!(analyzer.get_next_nodes(Some(b)).unwrap(), vec![b]);
    }

    #[test]
    fn test_success_retry_pivot_yields_nothing() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Success, Retry),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let a = graph.atom("a").unwrap();
        assert!(analyzer.get_next_nodes(Some(a)).unwrap().is_empty());
    }

    #[test]
    fn test_failure_pivot_scans_whole_graph_for_revert() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Success, Execute),
            ("c", Failure, Revert),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let (a, b, c) = (
            graph.atom("a").unwrap(),
            graph.atom("b").unwrap(),
            graph.atom("c").unwrap(),
        );

        // Only c itself may start reverting.
        assert_eq!(analyzer.get_next_nodes(Some(c)).unwrap(), vec![c]);

        // Even when b is meant to revert, its FAILURE successor blocks it.
        store.set("b", Success, Revert);
        assert!(!analyzer.is_ready_for_revert(b).unwrap());

        // Once c is rolled back, b unblocks, then a.
        store.set("c", Reverted, Revert);
        store.set("a", Success, Revert);
        assert_eq!(analyzer.get_next_nodes(Some(c)).unwrap(), vec![b]);
        assert!(analyzer.browse_nodes_for_revert(Some(b)).unwrap().is_empty());

        store.set("b", Reverted, Revert);
        assert_eq!(analyzer.get_next_nodes(Some(b)).unwrap(), vec![a]);
    }

    #[test]
    fn test_failure_unblocks_revert_far_from_pivot() {
        // x -> y and an unrelated z that failed.
        let graph = GraphBuilder::new()
            .add_task("x")
            .add_task("y")
            .add_task("z")
            .add_edge("x", "y")
            .build()
            .unwrap();
        let store = FakeStore::with(&[
            ("x", Success, Revert),
            ("y", Pending, Revert),
            ("z", Failure, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let z = graph.atom("z").unwrap();
        assert_eq!(names(&analyzer.get_next_nodes(Some(z)).unwrap()), vec!["x"]);
    }

    #[test]
    fn test_dispatch_table_is_exhaustive() {
        let graph = chain();
        for state in AtomState::ALL {
            for intention in AtomIntention::ALL {
                let store = FakeStore::with(&[
                    ("a", Success, Revert),
                    ("b", state, intention),
                    ("c", Pending, Execute),
                ]);
                let analyzer = GraphAnalyzer::new(&graph, &store);
                let b = graph.atom("b").unwrap();
                let next = analyzer.get_next_nodes(Some(b)).unwrap();
                match (state, intention) {
                    (Success, Revert) => assert_eq!(next, vec![b]),
                    (Success, Execute) => assert_eq!(names(&next), vec!["c"]),
                    (Reverted, _) => assert_eq!(names(&next), vec!["a"]),
                    // a is blocked by its FAILURE successor; b reverts unless
                    // it is still meant to execute.
                    (Failure, Execute) => assert!(next.is_empty()),
                    (Failure, _) => assert_eq!(names(&next), vec!["b"]),
                    _ => assert!(next.is_empty(), "{state} {intention} -> {next:?}"),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Readiness predicates
    // -----------------------------------------------------------------------

    #[test]
    fn test_predecessor_flipped_to_revert_blocks_successor() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Success, Revert),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(!analyzer.is_ready_for_execute(graph.atom("b").unwrap()).unwrap());
    }

    #[test]
    fn test_root_readiness_depends_only_on_itself() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Pending, Execute),
            ("b", Failure, Revert),
            ("c", Running, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let a = graph.atom("a").unwrap();
        assert!(analyzer.is_ready_for_execute(a).unwrap());

        store.set("a", Pending, Revert);
        assert!(!analyzer.is_ready_for_execute(a).unwrap());

        store.set("a", Success, Execute);
        assert!(!analyzer.is_ready_for_execute(a).unwrap());
    }

    #[test]
    fn test_retrying_controller_may_run_again() {
        let graph = GraphBuilder::new().add_retry("r").build().unwrap();
        let store = FakeStore::with(&[("r", AtomState::Retrying, Execute)]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(analyzer.is_ready_for_execute(graph.atom("r").unwrap()).unwrap());
    }

    #[test]
    fn test_revert_requires_inert_successors() {
        let graph = chain();
        let analyzer_for = |store: &FakeStore| -> bool {
            GraphAnalyzer::new(&graph, store)
                .is_ready_for_revert(graph.atom("a").unwrap())
                .unwrap()
        };

        for (successor_state, expected) in [
            (Pending, true),
            (Reverted, true),
            (Running, false),
            (Success, false),
            (Failure, false),
            (Reverting, false),
            (AtomState::Retrying, false),
        ] {
            let store = FakeStore::with(&[
                ("a", Success, Revert),
                ("b", successor_state, Revert),
                ("c", Pending, Revert),
            ]);
            assert_eq!(analyzer_for(&store), expected, "successor {successor_state}");
        }
    }

    #[test]
    fn test_retry_intention_counts_as_revert() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Success, Retry),
            ("c", Reverted, Revert),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(analyzer.is_ready_for_revert(graph.atom("b").unwrap()).unwrap());
        assert!(!analyzer.is_ready_for_revert(graph.atom("a").unwrap()).unwrap());
    }

    #[test]
    fn test_pending_atom_never_revert_ready() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Pending, Revert),
            ("b", Pending, Revert),
            ("c", Pending, Revert),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(analyzer.browse_nodes_for_revert(None).unwrap().is_empty());
    }

    #[test]
    fn test_neighbours_read_in_one_bulk_lookup() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Success, Execute),
            ("c", Success, Execute),
            ("d", Pending, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);

        assert!(analyzer.is_ready_for_execute(graph.atom("d").unwrap()).unwrap());
        assert_eq!(store.bulk_reads.load(Ordering::SeqCst), 1);

        // Roots have nothing to look up.
        store.set("a", Pending, Execute);
        assert!(analyzer.is_ready_for_execute(graph.atom("a").unwrap()).unwrap());
        assert_eq!(store.bulk_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_validator() {
        let graph = chain();
        let store = FakeStore::with(&[
            ("a", Pending, Execute),
            ("b", Pending, Execute),
            ("c", Pending, Execute),
        ]);
        let frozen = |_: AtomState, _: AtomState| false;
        let analyzer = GraphAnalyzer::with_validator(&graph, &store, frozen);
        assert!(analyzer.get_next_nodes(None).unwrap().is_empty());
    }

    #[test]
    fn test_no_self_inclusion() {
        let graph = diamond();
        let rows: Vec<(AtomState, AtomIntention)> = AtomState::ALL
            .into_iter()
            .flat_map(|s| AtomIntention::ALL.into_iter().map(move |i| (s, i)))
            .collect();

        // Put every atom in every combination, shifting per atom.
        for offset in 0..rows.len() {
            let store = FakeStore::default();
            for (i, atom) in graph.atoms().enumerate() {
                let (state, intention) = rows[(offset + i * 5) % rows.len()];
                store.set(&atom.name, state, intention);
            }
            let analyzer = GraphAnalyzer::new(&graph, &store);
            for atom in graph.atoms() {
                let execute = analyzer.browse_nodes_for_execute(Some(atom)).unwrap();
                let revert = analyzer.browse_nodes_for_revert(Some(atom)).unwrap();
                assert!(!execute.contains(&atom));
                assert!(!revert.contains(&atom));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn test_unknown_atom_propagates_not_found() {
        let graph = chain();
        let store = FakeStore::with(&[("a", Success, Execute), ("c", Pending, Execute)]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let missing = StoreError::NotFound("b".to_string());

        assert_eq!(analyzer.get_next_nodes(None).unwrap_err(), missing);
        assert_eq!(
            analyzer.get_next_nodes(graph.atom("b")).unwrap_err(),
            missing
        );
        // c's predecessor lookup hits the missing row.
        assert_eq!(
            analyzer.is_ready_for_execute(graph.atom("c").unwrap()).unwrap_err(),
            missing
        );
        assert_eq!(analyzer.is_success().unwrap_err(), missing);
        assert_eq!(analyzer.unfinished_nodes().unwrap_err(), missing);
        assert_eq!(analyzer.failed_nodes().unwrap_err(), missing);
    }

    #[test]
    fn test_unknown_atom_propagates_not_found_on_revert() {
        let graph = chain();
        let store = FakeStore::with(&[("a", Success, Revert), ("c", Reverted, Revert)]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let missing = StoreError::NotFound("b".to_string());

        // a may revert on its own, so its successor lookup hits the missing row.
        assert_eq!(
            analyzer.is_ready_for_revert(graph.atom("a").unwrap()).unwrap_err(),
            missing
        );
        // c's only predecessor is the missing row.
        assert_eq!(
            analyzer.browse_nodes_for_revert(graph.atom("c")).unwrap_err(),
            missing
        );
        assert_eq!(
            analyzer.get_next_nodes(graph.atom("c")).unwrap_err(),
            missing
        );
        assert_eq!(analyzer.browse_nodes_for_revert(None).unwrap_err(), missing);
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    fn nested_retries() -> ExecutionGraph {
        // r -> x -> y -> z -> w, with z a nested controller governing w.
        GraphBuilder::new()
            .add_task("top")
            .add_retry("r")
            .add_task("x")
            .add_task("y")
            .add_retry("z")
            .add_task("w")
            .add_edge("top", "r")
            .add_edge("r", "x")
            .add_edge("x", "y")
            .add_edge("y", "z")
            .add_edge("z", "w")
            .set_retry("x", "r")
            .set_retry("y", "r")
            .set_retry("z", "r")
            .set_retry("w", "z")
            .build()
            .unwrap()
    }

    #[test]
    fn test_subgraph_includes_nested_controllers() {
        let graph = nested_retries();
        let store = FakeStore::default();
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let r = graph.atom("r").unwrap();
        let visited: Vec<&str> = analyzer
            .iterate_subgraph(r)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(visited, vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn test_find_atom_retry() {
        let graph = nested_retries();
        let store = FakeStore::default();
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let retry_of = |name: &str| {
            analyzer
                .find_atom_retry(graph.atom(name).unwrap())
                .map(|r| r.name.as_str())
        };
        assert_eq!(retry_of("x"), Some("r"));
        assert_eq!(retry_of("w"), Some("z"));
        assert_eq!(retry_of("z"), Some("r"));
        assert_eq!(retry_of("top"), None);
    }

    #[test]
    fn test_iterate_retries() {
        let graph = nested_retries();
        // No filter: the store is never consulted.
        let empty = FakeStore::default();
        let analyzer = GraphAnalyzer::new(&graph, &empty);
        let all: Vec<&str> = analyzer
            .iterate_retries(None)
            .map(|r| r.unwrap().name.as_str())
            .collect();
        assert_eq!(all, vec!["r", "z"]);

        let store = FakeStore::with(&[
            ("top", Success, Execute),
            ("r", Success, Execute),
            ("x", Success, Execute),
            ("y", Success, Execute),
            ("z", AtomState::Retrying, Execute),
            ("w", Pending, Revert),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        let retrying: Vec<&str> = analyzer
            .iterate_retries(Some(AtomState::Retrying))
            .map(|r| r.unwrap().name.as_str())
            .collect();
        assert_eq!(retrying, vec!["z"]);

        // A filtered walk over an incomplete store surfaces the read error.
        let analyzer = GraphAnalyzer::new(&graph, &empty);
        let first = analyzer.iterate_retries(Some(Success)).next().unwrap();
        assert_eq!(first.unwrap_err(), StoreError::NotFound("r".to_string()));
    }

    #[test]
    fn test_iterate_all_nodes() {
        let graph = nested_retries();
        let store = FakeStore::default();
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert_eq!(analyzer.iterate_all_nodes().count(), 6);
        assert!(std::ptr::eq(analyzer.execution_graph(), &graph));
    }

    // -----------------------------------------------------------------------
    // Whole-graph queries
    // -----------------------------------------------------------------------

    #[test]
    fn test_is_success_flips_with_any_atom() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Success, Execute),
            ("c", Success, Execute),
            ("d", Success, Execute),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(analyzer.is_success().unwrap());

        for atom in graph.atoms() {
            store.set(&atom.name, Reverted, Execute);
            assert!(!analyzer.is_success().unwrap(), "{} flipped", atom.name);
            store.set(&atom.name, Success, Execute);
        }
        assert!(analyzer.is_success().unwrap());
    }

    #[test]
    fn test_empty_graph_is_success() {
        let graph = GraphBuilder::new().build().unwrap();
        let store = FakeStore::default();
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert!(analyzer.is_success().unwrap());
        assert!(analyzer.get_next_nodes(None).unwrap().is_empty());
    }

    #[test]
    fn test_unfinished_and_failed_nodes() {
        let graph = diamond();
        let store = FakeStore::with(&[
            ("a", Success, Execute),
            ("b", Running, Execute),
            ("c", Reverting, Revert),
            ("d", Failure, Revert),
        ]);
        let analyzer = GraphAnalyzer::new(&graph, &store);
        assert_eq!(names(&analyzer.unfinished_nodes().unwrap()), vec!["b", "c"]);
        assert_eq!(names(&analyzer.failed_nodes().unwrap()), vec!["d"]);
        assert_eq!(analyzer.get_state(graph.atom("d").unwrap()).unwrap(), Failure);
    }
}
