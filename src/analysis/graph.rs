/// Directed transfer flow graph
///
/// Nodes are addresses; an edge (a -> b) accumulates the total amount and
/// transfer count from a to b. Built fresh per analysis run.

use crate::config::CycleBounds;
use crate::core::Transfer;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeFlow {
    pub weight: f64,
    pub count: u64,
}

pub struct FlowGraph {
    graph: DiGraph<String, EdgeFlow>,
    node_index: HashMap<String, NodeIndex>,
}

/// Result of bounded simple-cycle enumeration. `truncated` is set when the
/// graph exceeded the node cap or the search hit the cycle cap, so callers
/// report a partial result instead of hanging.
#[derive(Debug, Default)]
pub struct CycleSearch {
    pub cycles: Vec<Vec<NodeIndex>>,
    pub truncated: bool,
}

impl FlowGraph {
    pub fn from_transfers(transfers: &[Transfer]) -> Self {
        let mut flow = Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        };
        for transfer in transfers {
            flow.add_transfer(transfer);
        }
        flow
    }

    fn add_transfer(&mut self, transfer: &Transfer) {
        let from = self.get_or_insert(&transfer.sender);
        let to = self.get_or_insert(&transfer.receiver);
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                let flow = &mut self.graph[edge];
                flow.weight += transfer.amount;
                flow.count += 1;
            }
            None => {
                self.graph.add_edge(
                    from,
                    to,
                    EdgeFlow {
                        weight: transfer.amount,
                        count: 1,
                    },
                );
            }
        }
    }

    fn get_or_insert(&mut self, address: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(address) {
            return idx;
        }
        let idx = self.graph.add_node(address.to_string());
        self.node_index.insert(address.to_string(), idx);
        idx
    }

    pub fn graph(&self) -> &DiGraph<String, EdgeFlow> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn address(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    pub fn edge_flow(&self, from: NodeIndex, to: NodeIndex) -> Option<EdgeFlow> {
        self.graph.find_edge(from, to).map(|e| self.graph[e])
    }

    /// Whether the graph is weakly connected (single component, ignoring
    /// edge direction). Empty graphs count as disconnected.
    pub fn is_weakly_connected(&self) -> bool {
        self.graph.node_count() > 0 && petgraph::algo::connected_components(&self.graph) == 1
    }

    /// Enumerate simple cycles with length within the configured bounds.
    ///
    /// Each cycle is reported once, rooted at its smallest node index. The
    /// search keeps termination guarantees on adversarial graphs: above
    /// `max_nodes` nodes no enumeration is attempted, and collection stops
    /// at `max_cycles`.
    pub fn simple_cycles(&self, bounds: &CycleBounds) -> CycleSearch {
        let mut search = CycleSearch::default();
        if self.graph.node_count() == 0 {
            return search;
        }
        if self.graph.node_count() > bounds.max_nodes {
            debug!(
                "cycle enumeration skipped: {} nodes exceeds cap of {}",
                self.graph.node_count(),
                bounds.max_nodes
            );
            search.truncated = true;
            return search;
        }

        let mut path = Vec::new();
        let mut on_path = vec![false; self.graph.node_count()];
        for start in self.graph.node_indices() {
            if search.cycles.len() >= bounds.max_cycles {
                search.truncated = true;
                break;
            }
            self.cycle_dfs(start, start, bounds, &mut path, &mut on_path, &mut search);
        }
        search
    }

    fn cycle_dfs(
        &self,
        start: NodeIndex,
        current: NodeIndex,
        bounds: &CycleBounds,
        path: &mut Vec<NodeIndex>,
        on_path: &mut [bool],
        search: &mut CycleSearch,
    ) {
        path.push(current);
        on_path[current.index()] = true;

        for edge in self.graph.edges(current) {
            if search.cycles.len() >= bounds.max_cycles {
                search.truncated = true;
                break;
            }
            let next = edge.target();
            if next == start {
                if path.len() >= bounds.min_length && path.len() <= bounds.max_length {
                    search.cycles.push(path.clone());
                }
            } else if next.index() > start.index()
                && !on_path[next.index()]
                && path.len() < bounds.max_length
            {
                self.cycle_dfs(start, next, bounds, path, on_path, search);
            }
        }

        on_path[current.index()] = false;
        path.pop();
    }
}
