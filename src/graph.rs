// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! An undirected multigraph with stable integer vertex and edge indices,
//! used to represent the switching devices and equipment terminals of a
//! voltage level.
//!
//! Vertices are numbered slots that optionally hold a payload (a terminal
//! reference).  They are never removed, only emptied, so indices stay stable
//! for the lifetime of the graph.  Edges optionally hold a payload (a
//! switching device reference); an edge without a payload is a plain internal
//! connection that is always traversable.

use std::collections::{HashSet, VecDeque};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

/// The result returned by a traversal visitor for one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraverseResult {
    /// Keep expanding the traversal beyond this edge.
    Continue,
    /// Do not expand the traversal beyond this edge.
    Terminate,
}

/// An undirected multigraph with optional vertex payloads of type `V` and
/// optional edge payloads of type `E`.
pub struct UndirectedGraph<V, E> {
    graph: StableUnGraph<Option<V>, Option<E>>,
}

impl<V, E> Default for UndirectedGraph<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> UndirectedGraph<V, E> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            graph: StableUnGraph::default(),
        }
    }

    fn node(&self, v: usize) -> &Option<V> {
        self.graph
            .node_weight(NodeIndex::new(v))
            .unwrap_or_else(|| panic!("Vertex {v} not found"))
    }

    /// Adds an empty vertex and returns its index.
    pub fn add_vertex(&mut self) -> usize {
        self.graph.add_node(None).index()
    }

    /// Grows the graph to `count` vertices.  The vertex count never shrinks.
    pub fn set_vertex_count(&mut self, count: usize) {
        while self.graph.node_count() < count {
            self.graph.add_node(None);
        }
    }

    /// Returns the number of vertices in the graph.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns an iterator over all vertex indices.
    pub fn vertices(&self) -> impl Iterator<Item = usize> {
        // Vertices are never removed, so indices are dense.
        0..self.graph.node_count()
    }

    /// Returns the payload of the given vertex, if any.
    pub fn vertex_object(&self, v: usize) -> Option<&V> {
        self.node(v).as_ref()
    }

    /// Sets the payload of the given vertex, returning the previous one.
    pub fn set_vertex_object(&mut self, v: usize, object: V) -> Option<V> {
        self.graph
            .node_weight_mut(NodeIndex::new(v))
            .unwrap_or_else(|| panic!("Vertex {v} not found"))
            .replace(object)
    }

    /// Clears the payload of the given vertex, returning it.
    pub fn remove_vertex_object(&mut self, v: usize) -> Option<V> {
        self.graph
            .node_weight_mut(NodeIndex::new(v))
            .unwrap_or_else(|| panic!("Vertex {v} not found"))
            .take()
    }

    /// Adds an edge between `v1` and `v2` and returns its index.  Freed edge
    /// indices are reused.
    pub fn add_edge(&mut self, v1: usize, v2: usize, object: Option<E>) -> usize {
        self.node(v1);
        self.node(v2);
        self.graph
            .add_edge(NodeIndex::new(v1), NodeIndex::new(v2), object)
            .index()
    }

    /// Removes the given edge and returns its payload.
    pub fn remove_edge(&mut self, e: usize) -> Option<E> {
        self.graph
            .remove_edge(EdgeIndex::new(e))
            .unwrap_or_else(|| panic!("Edge {e} not found"))
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns an iterator over all edge indices.
    pub fn edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.graph.edge_indices().map(|e| e.index())
    }

    fn endpoints(&self, e: usize) -> (usize, usize) {
        let (a, b) = self
            .graph
            .edge_endpoints(EdgeIndex::new(e))
            .unwrap_or_else(|| panic!("Edge {e} not found"));
        (a.index(), b.index())
    }

    /// Returns the first vertex of the given edge.
    pub fn edge_vertex1(&self, e: usize) -> usize {
        self.endpoints(e).0
    }

    /// Returns the second vertex of the given edge.
    pub fn edge_vertex2(&self, e: usize) -> usize {
        self.endpoints(e).1
    }

    /// Returns the vertex on the other side of `e` as seen from `v`.
    pub fn edge_other_vertex(&self, e: usize, v: usize) -> usize {
        let (v1, v2) = self.endpoints(e);
        if v == v1 {
            v2
        } else {
            v1
        }
    }

    /// Returns the payload of the given edge, if any.
    pub fn edge_object(&self, e: usize) -> Option<&E> {
        self.graph
            .edge_weight(EdgeIndex::new(e))
            .unwrap_or_else(|| panic!("Edge {e} not found"))
            .as_ref()
    }

    /// Returns the indices of the edges incident to the given vertex.
    pub fn edges_connected_to_vertex(&self, v: usize) -> Vec<usize> {
        self.node(v);
        self.graph
            .edges(NodeIndex::new(v))
            .map(|edge| edge.id().index())
            .collect()
    }

    /// Traverses the graph from `start`, calling `traverser` once per
    /// encountered edge with `(v1, e, v2)` where `v1` is the already-visited
    /// side.  When the visitor returns [`TraverseResult::Terminate`] the
    /// traversal does not expand beyond that edge.
    ///
    /// Visited vertices are flagged in `visited`, which lets callers chain
    /// traversals over the same graph; each vertex is expanded at most once
    /// per mask.  Panics if `visited` is smaller than the vertex count.
    pub fn traverse(
        &self,
        start: usize,
        mut traverser: impl FnMut(usize, usize, usize) -> TraverseResult,
        visited: &mut [bool],
    ) {
        self.node(start);
        assert!(
            visited.len() >= self.vertex_count(),
            "Visited array is too small"
        );

        let mut encountered_edges = HashSet::new();
        let mut queue = VecDeque::new();

        let mut expand = |v: usize, queue: &mut VecDeque<(usize, usize, usize)>| {
            for e in self.edges_connected_to_vertex(v) {
                if encountered_edges.insert(e) {
                    queue.push_back((v, e, self.edge_other_vertex(e, v)));
                }
            }
        };

        visited[start] = true;
        expand(start, &mut queue);
        while let Some((v1, e, v2)) = queue.pop_front() {
            if traverser(v1, e, v2) == TraverseResult::Continue && !visited[v2] {
                visited[v2] = true;
                expand(v2, &mut queue);
            }
        }
    }

    /// Same as [`traverse`][Self::traverse], with a fresh visited mask.
    pub fn traverse_from(
        &self,
        start: usize,
        traverser: impl FnMut(usize, usize, usize) -> TraverseResult,
    ) {
        let mut visited = vec![false; self.vertex_count()];
        self.traverse(start, traverser, &mut visited);
    }

    /// Finds all simple paths from `start` to any vertex whose payload
    /// satisfies `is_target`, never crossing an edge whose payload satisfies
    /// `is_blocked`.  Each branch of the search stops at the first target
    /// vertex it reaches.  Paths are sequences of edge indices, sorted from
    /// shortest to longest.
    pub fn find_all_paths(
        &self,
        start: usize,
        is_target: impl Fn(Option<&V>) -> bool,
        is_blocked: impl Fn(Option<&E>) -> bool,
    ) -> Vec<Vec<usize>> {
        self.node(start);
        let mut paths = Vec::new();
        let encountered = vec![false; self.vertex_count()];
        self.find_paths_from(start, &is_target, &is_blocked, Vec::new(), encountered, &mut paths);
        paths.sort_by_key(Vec::len);
        paths
    }

    fn find_paths_from<T, B>(
        &self,
        v: usize,
        is_target: &T,
        is_blocked: &B,
        path: Vec<usize>,
        mut encountered: Vec<bool>,
        paths: &mut Vec<Vec<usize>>,
    ) where
        T: Fn(Option<&V>) -> bool,
        B: Fn(Option<&E>) -> bool,
    {
        encountered[v] = true;
        for e in self.edges_connected_to_vertex(v) {
            if is_blocked(self.edge_object(e)) {
                continue;
            }
            let w = self.edge_other_vertex(e, v);
            if encountered[w] {
                continue;
            }
            let mut extended = path.clone();
            extended.push(e);
            if is_target(self.vertex_object(w)) {
                paths.push(extended);
            } else {
                self.find_paths_from(w, is_target, is_blocked, extended, encountered.clone(), paths);
            }
        }
    }
}
