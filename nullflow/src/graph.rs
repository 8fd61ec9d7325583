use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// The part of the control flow a run actually explored: instruction indices
/// as nodes, one edge per (from, to) transition ever taken. Instructions the
/// analysis proved unreachable never appear in it.
#[derive(Debug, Clone, Default)]
pub struct ExploredFlow {
    graph: DiGraph<usize, ()>,
    indices: HashMap<usize, NodeIndex>,
}

impl ExploredFlow {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, instruction: usize) -> NodeIndex {
        if let Some(&index) = self.indices.get(&instruction) {
            return index;
        }
        let index = self.graph.add_node(instruction);
        self.indices.insert(instruction, index);
        index
    }

    pub(crate) fn add_node(&mut self, instruction: usize) {
        self.node(instruction);
    }

    pub(crate) fn add_edge(&mut self, from: usize, to: usize) {
        let from = self.node(from);
        let to = self.node(to);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn graph(&self) -> &DiGraph<usize, ()> {
        &self.graph
    }

    pub fn contains(&self, instruction: usize) -> bool {
        self.indices.contains_key(&instruction)
    }

    pub fn successors(&self, instruction: usize) -> Vec<usize> {
        let Some(&index) = self.indices.get(&instruction) else {
            return vec![];
        };
        self.graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect()
    }

    /// Explored instructions with no outgoing transition, i.e. the ends of
    /// the flow (or the points where exploration was cut off).
    pub fn leaf_nodes(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|n| self.graph[n])
            .collect()
    }
}
