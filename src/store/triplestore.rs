//! Triple store adapter
//!
//! The [`TripleStore`] trait is the seam between the repository core and a
//! quad store: named-graph reads, per-graph add/remove of triple sets,
//! graph-level updates (drop, atomic rename) and transactions. Every store
//! failure surfaces as [`RepoError::Store`] and aborts the enclosing
//! transaction.
//!
//! [`MemoryStore`] implements the trait in memory with snapshot-based
//! transactions; it backs the test suite and embedded deployments.

use crate::error::{RepoError, RepoResult};
use crate::rdf::TripleSet;
use oxrdf::{NamedNode, Subject, Term, Triple};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Transactional quad store abstraction.
///
/// All core mutations execute inside a transaction opened by the lifecycle
/// engine; the store provides isolation across concurrently open handles.
pub trait TripleStore: Send + Sync {
    /// Add a triple set to a named graph
    fn insert(&self, graph: &NamedNode, triples: &TripleSet) -> RepoResult<()>;

    /// Remove a triple set from a named graph
    fn remove(&self, graph: &NamedNode, triples: &TripleSet) -> RepoResult<()>;

    /// Remove every triple of a graph matching a pattern
    fn remove_matching(
        &self,
        graph: &NamedNode,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> RepoResult<usize>;

    /// Read a whole named graph (empty set when the graph does not exist)
    fn graph(&self, graph: &NamedNode) -> RepoResult<TripleSet>;

    /// Pattern scan within a named graph
    fn triples_matching(
        &self,
        graph: &NamedNode,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> RepoResult<Vec<Triple>>;

    fn contains(&self, graph: &NamedNode, triple: &Triple) -> RepoResult<bool>;

    /// Drop a named graph (no error when absent)
    fn drop_graph(&self, graph: &NamedNode) -> RepoResult<()>;

    /// Atomically rename a graph, replacing the target
    fn move_graph(&self, from: &NamedNode, to: &NamedNode) -> RepoResult<()>;

    /// Drop every graph in the store
    fn drop_all(&self) -> RepoResult<()>;

    fn graph_names(&self) -> RepoResult<Vec<NamedNode>>;

    // Transactional API

    fn begin(&self) -> RepoResult<()>;
    fn commit(&self) -> RepoResult<()>;
    fn rollback(&self) -> RepoResult<()>;
}

type GraphMap = FxHashMap<NamedNode, TripleSet>;

#[derive(Default)]
struct Inner {
    graphs: GraphMap,
    /// Committed state held aside while a transaction is open
    snapshot: Option<GraphMap>,
}

/// In-memory quad store with snapshot-based transactions.
///
/// `begin` sets the committed state aside, `rollback` restores it and
/// `commit` discards it. Reads inside a transaction see the uncommitted
/// writes. One transaction may be open per store at a time.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the data is a plain
        // graph map and stays usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TripleStore for MemoryStore {
    fn insert(&self, graph: &NamedNode, triples: &TripleSet) -> RepoResult<()> {
        let mut inner = self.inner();
        let gr = inner.graphs.entry(graph.clone()).or_default();
        gr.extend(triples.iter().cloned());
        Ok(())
    }

    fn remove(&self, graph: &NamedNode, triples: &TripleSet) -> RepoResult<()> {
        let mut inner = self.inner();
        if let Some(gr) = inner.graphs.get_mut(graph) {
            for t in triples.iter() {
                gr.remove(t);
            }
        }
        Ok(())
    }

    fn remove_matching(
        &self,
        graph: &NamedNode,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> RepoResult<usize> {
        let mut inner = self.inner();
        Ok(inner
            .graphs
            .get_mut(graph)
            .map(|gr| gr.remove_matching(subject, predicate, object))
            .unwrap_or(0))
    }

    fn graph(&self, graph: &NamedNode) -> RepoResult<TripleSet> {
        Ok(self.inner().graphs.get(graph).cloned().unwrap_or_default())
    }

    fn triples_matching(
        &self,
        graph: &NamedNode,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> RepoResult<Vec<Triple>> {
        Ok(self
            .inner()
            .graphs
            .get(graph)
            .map(|gr| {
                gr.triples_matching(subject, predicate, object)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn contains(&self, graph: &NamedNode, triple: &Triple) -> RepoResult<bool> {
        Ok(self
            .inner()
            .graphs
            .get(graph)
            .map(|gr| gr.contains(triple))
            .unwrap_or(false))
    }

    fn drop_graph(&self, graph: &NamedNode) -> RepoResult<()> {
        self.inner().graphs.remove(graph);
        Ok(())
    }

    fn move_graph(&self, from: &NamedNode, to: &NamedNode) -> RepoResult<()> {
        let mut inner = self.inner();
        let moved = inner.graphs.remove(from).unwrap_or_default();
        inner.graphs.insert(to.clone(), moved);
        Ok(())
    }

    fn drop_all(&self) -> RepoResult<()> {
        debug!("Dropping all graphs");
        self.inner().graphs.clear();
        Ok(())
    }

    fn graph_names(&self) -> RepoResult<Vec<NamedNode>> {
        Ok(self.inner().graphs.keys().cloned().collect())
    }

    fn begin(&self) -> RepoResult<()> {
        let mut inner = self.inner();
        if inner.snapshot.is_some() {
            return Err(RepoError::Store("transaction already open".to_string()));
        }
        inner.snapshot = Some(inner.graphs.clone());
        Ok(())
    }

    fn commit(&self) -> RepoResult<()> {
        let mut inner = self.inner();
        if inner.snapshot.take().is_none() {
            return Err(RepoError::Store("no open transaction to commit".to_string()));
        }
        Ok(())
    }

    fn rollback(&self) -> RepoResult<()> {
        let mut inner = self.inner();
        match inner.snapshot.take() {
            Some(snap) => {
                inner.graphs = snap;
                Ok(())
            }
            None => Err(RepoError::Store(
                "no open transaction to roll back".to_string(),
            )),
        }
    }
}
