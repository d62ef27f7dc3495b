//! Immutable execution graph and its builder.
//!
//! Uses `petgraph` to model atom dependencies as a directed graph: an edge
//! `a -> b` means `a` must complete before `b` may start. The association of
//! an atom with its nearest enclosing retry controller is a name-keyed lookup
//! table kept beside the graph, never a pointer stored in the atom.

use std::collections::HashMap;

use atomflow_types::atom::{Atom, AtomKind};
use atomflow_types::config::GraphConfig;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Visitable};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while building an execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two atoms share a name.
    #[error("duplicate atom: '{0}'")]
    DuplicateAtom(String),

    /// An edge or retry association names an atom that was never added.
    #[error("unknown atom: '{0}'")]
    UnknownAtom(String),

    /// A retry association points at an atom that is not a retry controller.
    #[error("atom '{atom}' is associated with '{controller}', which is not a retry controller")]
    NotARetryController { atom: String, controller: String },

    /// An atom was associated with more than one retry controller.
    #[error("atom '{0}' is associated with more than one retry controller")]
    DuplicateRetry(String),

    /// A retry controller was associated with itself.
    #[error("retry controller '{0}' cannot govern itself")]
    SelfGoverningRetry(String),

    /// The dependency graph contains a cycle.
    #[error("cycle detected involving atom '{0}'")]
    CycleDetected(String),
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

/// Collects atoms, edges, and retry associations, then validates them into an
/// `ExecutionGraph`.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    atoms: Vec<Atom>,
    edges: Vec<(String, String)>,
    retries: Vec<(String, String)>,
    verify_acyclic: bool,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::from_config(&GraphConfig::default())
    }

    /// Create a builder honouring the `[graph]` configuration section.
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            atoms: Vec::new(),
            edges: Vec::new(),
            retries: Vec::new(),
            verify_acyclic: config.verify_acyclic,
        }
    }

    /// Toggle the topological-sort cycle check performed by `build`.
    pub fn verify_acyclic(mut self, verify: bool) -> Self {
        self.verify_acyclic = verify;
        self
    }

    pub fn add_atom(mut self, atom: Atom) -> Self {
        self.atoms.push(atom);
        self
    }

    pub fn add_task(self, name: impl Into<String>) -> Self {
        self.add_atom(Atom::task(name))
    }

    pub fn add_retry(self, name: impl Into<String>) -> Self {
        self.add_atom(Atom::retry(name))
    }

    /// Declare that `from` must complete before `to` may start.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Associate `atom` with its nearest enclosing retry controller.
    pub fn set_retry(mut self, atom: impl Into<String>, controller: impl Into<String>) -> Self {
        self.retries.push((atom.into(), controller.into()));
        self
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<ExecutionGraph, GraphError> {
        let mut graph = DiGraph::<Atom, ()>::with_capacity(self.atoms.len(), self.edges.len());
        let mut indices: HashMap<String, NodeIndex> = HashMap::with_capacity(self.atoms.len());

        for atom in self.atoms {
            if indices.contains_key(&atom.name) {
                return Err(GraphError::DuplicateAtom(atom.name));
            }
            let name = atom.name.clone();
            indices.insert(name, graph.add_node(atom));
        }

        let lookup = |name: &str| {
            indices
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::UnknownAtom(name.to_string()))
        };

        for (from, to) in &self.edges {
            let (from_idx, to_idx) = (lookup(from)?, lookup(to)?);
            // Repeated declarations collapse into one edge.
            graph.update_edge(from_idx, to_idx, ());
        }

        let mut retries = HashMap::with_capacity(self.retries.len());
        for (atom, controller) in self.retries {
            lookup(&atom)?;
            let controller_idx = lookup(&controller)?;
            if graph[controller_idx].kind != AtomKind::Retry {
                return Err(GraphError::NotARetryController { atom, controller });
            }
            if atom == controller {
                return Err(GraphError::SelfGoverningRetry(atom));
            }
            // Each atom has exactly one nearest enclosing controller.
            if retries.contains_key(&atom) {
                return Err(GraphError::DuplicateRetry(atom));
            }
            retries.insert(atom, controller);
        }

        if self.verify_acyclic {
            toposort(&graph, None).map_err(|cycle| {
                GraphError::CycleDetected(graph[cycle.node_id()].name.clone())
            })?;
        }

        tracing::debug!(
            atoms = graph.node_count(),
            edges = graph.edge_count(),
            retry_associations = retries.len(),
            "built execution graph"
        );

        Ok(ExecutionGraph {
            graph,
            indices,
            retries,
        })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ExecutionGraph
// ---------------------------------------------------------------------------

/// Read-only directed graph of atoms.
///
/// Structurally immutable once built; all analysis borrows it.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    graph: DiGraph<Atom, ()>,
    indices: HashMap<String, NodeIndex>,
    /// atom name -> retry controller name
    retries: HashMap<String, String>,
}

impl ExecutionGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Look up an atom by name.
    pub fn atom(&self, name: &str) -> Option<&Atom> {
        self.indices.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// All atoms, in insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct predecessors of the named atom; empty for unknown names.
    pub fn predecessors(&self, name: &str) -> Vec<&Atom> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Direct successors of the named atom; empty for unknown names.
    pub fn successors(&self, name: &str) -> Vec<&Atom> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&Atom> {
        match self.indices.get(name) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every `(from, to)` dependency edge.
    pub fn edges(&self) -> impl Iterator<Item = (&Atom, &Atom)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()]))
    }

    /// The retry controller governing the named atom, if any.
    pub fn retry_controller_of(&self, name: &str) -> Option<&Atom> {
        self.retries
            .get(name)
            .and_then(|controller| self.atom(controller))
    }

    /// Atoms in dependency order.
    ///
    /// Only fails when the graph was built with the cycle check disabled.
    pub fn topological_order(&self) -> Result<Vec<&Atom>, GraphError> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            GraphError::CycleDetected(self.graph[cycle.node_id()].name.clone())
        })?;
        Ok(sorted.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// Lazy depth-first walk of everything reachable from the named atom,
    /// excluding the atom itself. Empty for unknown names.
    pub fn subgraph(&self, name: &str) -> Subgraph<'_> {
        let dfs = self.indices.get(name).map(|&start| {
            let mut dfs = Dfs::new(&self.graph, start);
            // The first node visited is the start itself.
            dfs.next(&self.graph);
            dfs
        });
        Subgraph { graph: self, dfs }
    }
}

// ---------------------------------------------------------------------------
// Subgraph traversal
// ---------------------------------------------------------------------------

type VisitMap = <DiGraph<Atom, ()> as Visitable>::Map;

/// Depth-first iterator over the atoms reachable from a starting atom.
///
/// Nested retry controllers do not stop the walk: their governed atoms are
/// yielded as well. Each atom is yielded once, and the walk terminates even
/// on a graph built without the cycle check.
pub struct Subgraph<'g> {
    graph: &'g ExecutionGraph,
    dfs: Option<Dfs<NodeIndex, VisitMap>>,
}

impl<'g> Iterator for Subgraph<'g> {
    type Item = &'g Atom;

    fn next(&mut self) -> Option<Self::Item> {
        let dfs = self.dfs.as_mut()?;
        let graph = self.graph;
        dfs.next(&graph.graph).map(|idx| &graph.graph[idx])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
