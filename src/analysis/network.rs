/// Flow-graph metrics for wash-trading detection
///
/// Descriptive statistics only, computed once per run: centralities,
/// weighted PageRank, connectivity-gated diameter, modularity communities
/// and a centralization score. High centralization means a handful of
/// addresses control most of the flow.

use crate::analysis::graph::FlowGraph;
use crate::core::Transfer;
use crate::util::stats;
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_TOL: f64 = 1e-6;
const PAGERANK_MAX_ITER: usize = 100;

/// Diameter is only defined on a weakly connected graph with every node
/// pair reachable; otherwise a string sentinel is reported so the JSON
/// output never carries a non-finite number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Diameter {
    Hops(u64),
    Unavailable(String),
}

impl Diameter {
    fn unavailable() -> Self {
        Diameter::Unavailable("unavailable".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkMetrics {
    pub nodes: usize,
    pub edges: usize,
    pub average_degree: f64,
    pub diameter: Diameter,
    pub degree_centrality: BTreeMap<String, f64>,
    pub betweenness_centrality: BTreeMap<String, f64>,
    pub pagerank: BTreeMap<String, f64>,
    pub communities: usize,
    pub partition: BTreeMap<String, usize>,
    pub centralization_score: f64,
}

/// Either the full metric set or an error marker; a metric failure never
/// aborts the rest of the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NetworkAnalysis {
    Metrics(NetworkMetrics),
    Failed { error: String },
}

impl NetworkAnalysis {
    pub fn centralization_score(&self) -> f64 {
        match self {
            NetworkAnalysis::Metrics(m) => m.centralization_score,
            NetworkAnalysis::Failed { .. } => 0.0,
        }
    }
}

pub struct NetworkAnalyzer;

impl NetworkAnalyzer {
    pub fn analyze(transfers: &[Transfer]) -> NetworkAnalysis {
        let flow = FlowGraph::from_transfers(transfers);
        let n = flow.node_count();
        info!("🌐 Analyzing transfer network: {} nodes, {} edges", n, flow.edge_count());

        if n == 0 {
            return NetworkAnalysis::Metrics(NetworkMetrics {
                nodes: 0,
                edges: 0,
                average_degree: 0.0,
                diameter: Diameter::unavailable(),
                degree_centrality: BTreeMap::new(),
                betweenness_centrality: BTreeMap::new(),
                pagerank: BTreeMap::new(),
                communities: 0,
                partition: BTreeMap::new(),
                centralization_score: 0.0,
            });
        }

        let pagerank = match weighted_pagerank(&flow) {
            Ok(values) => values,
            Err(error) => {
                warn!("Network analysis error: {}", error);
                return NetworkAnalysis::Failed { error };
            }
        };
        let centralization_score = stats::coefficient_of_variation(&pagerank);

        let partition = louvain_partition(&flow);
        let communities = partition.iter().copied().max().map_or(0, |max| max + 1);

        let betweenness = betweenness_centrality(&flow);
        let degree = degree_centrality(&flow);

        let named = |values: &[f64]| -> BTreeMap<String, f64> {
            flow.graph()
                .node_indices()
                .map(|idx| (flow.address(idx).to_string(), values[idx.index()]))
                .collect()
        };

        NetworkAnalysis::Metrics(NetworkMetrics {
            nodes: n,
            edges: flow.edge_count(),
            average_degree: 2.0 * flow.edge_count() as f64 / n as f64,
            diameter: diameter(&flow),
            degree_centrality: named(&degree),
            betweenness_centrality: named(&betweenness),
            pagerank: named(&pagerank),
            communities,
            partition: flow
                .graph()
                .node_indices()
                .map(|idx| (flow.address(idx).to_string(), partition[idx.index()]))
                .collect(),
            centralization_score,
        })
    }
}

/// Total degree (in + out) over the maximum possible (n - 1).
fn degree_centrality(flow: &FlowGraph) -> Vec<f64> {
    let graph = flow.graph();
    let n = graph.node_count();
    let scale = 1.0 / (n.saturating_sub(1).max(1)) as f64;
    graph
        .node_indices()
        .map(|idx| {
            let degree = graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .count()
                + graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count();
            degree as f64 * scale
        })
        .collect()
}

/// Brandes' algorithm on the directed, unweighted graph, normalized by
/// (n-1)(n-2) for n > 2.
fn betweenness_centrality(flow: &FlowGraph) -> Vec<f64> {
    let graph = flow.graph();
    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    for source in graph.node_indices() {
        let mut stack = Vec::new();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0; n];
        let mut dist = vec![-1i64; n];
        sigma[source.index()] = 1.0;
        dist[source.index()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for edge in graph.edges(v) {
                let w = edge.target();
                if dist[w.index()] < 0 {
                    dist[w.index()] = dist[v.index()] + 1;
                    queue.push_back(w);
                }
                if dist[w.index()] == dist[v.index()] + 1 {
                    sigma[w.index()] += sigma[v.index()];
                    predecessors[w.index()].push(v.index());
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w.index()] {
                delta[v] += sigma[v] / sigma[w.index()] * (1.0 + delta[w.index()]);
            }
            if w != source {
                centrality[w.index()] += delta[w.index()];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for value in &mut centrality {
            *value *= scale;
        }
    }
    centrality
}

/// Power iteration weighted by edge amounts. Dangling mass redistributes
/// uniformly. Non-convergence is surfaced to the caller instead of
/// returning a half-iterated vector.
fn weighted_pagerank(flow: &FlowGraph) -> Result<Vec<f64>, String> {
    let graph = flow.graph();
    let n = graph.node_count();
    let uniform = 1.0 / n as f64;
    let mut rank = vec![uniform; n];

    let mut out_weight = vec![0.0; n];
    for edge in graph.edge_references() {
        out_weight[edge.source().index()] += edge.weight().weight;
    }

    for _ in 0..PAGERANK_MAX_ITER {
        let dangling_mass: f64 = (0..n)
            .filter(|&i| out_weight[i] == 0.0)
            .map(|i| rank[i])
            .sum();
        let base = (1.0 - PAGERANK_DAMPING) * uniform + PAGERANK_DAMPING * dangling_mass * uniform;
        let mut next = vec![base; n];
        for edge in graph.edge_references() {
            let source = edge.source().index();
            if out_weight[source] > 0.0 {
                next[edge.target().index()] += PAGERANK_DAMPING
                    * rank[source]
                    * (edge.weight().weight / out_weight[source]);
            }
        }
        let err: f64 = next
            .iter()
            .zip(rank.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        rank = next;
        if err < n as f64 * PAGERANK_TOL {
            return Ok(rank);
        }
    }
    Err(format!(
        "pagerank failed to converge within {} iterations",
        PAGERANK_MAX_ITER
    ))
}

/// BFS eccentricities over directed hops, gated on weak connectivity.
fn diameter(flow: &FlowGraph) -> Diameter {
    if !flow.is_weakly_connected() {
        return Diameter::unavailable();
    }
    let graph = flow.graph();
    let n = graph.node_count();
    let mut max_dist = 0u64;

    for source in graph.node_indices() {
        let mut dist = vec![-1i64; n];
        dist[source.index()] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(source);
        let mut reached = 1;
        while let Some(v) = queue.pop_front() {
            for edge in graph.edges(v) {
                let w = edge.target();
                if dist[w.index()] < 0 {
                    dist[w.index()] = dist[v.index()] + 1;
                    reached += 1;
                    max_dist = max_dist.max(dist[w.index()] as u64);
                    queue.push_back(w);
                }
            }
        }
        if reached < n {
            // weakly but not strongly connected; directed diameter undefined
            return Diameter::unavailable();
        }
    }
    Diameter::Hops(max_dist)
}

/// Louvain modularity optimization on the undirected projection.
/// Deterministic: nodes are visited in index order and ties keep the
/// current community.
fn louvain_partition(flow: &FlowGraph) -> Vec<usize> {
    let graph = flow.graph();
    let n = graph.node_count();

    // undirected projection with summed reciprocal weights
    let mut edges: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for edge in graph.edge_references() {
        let (mut a, mut b) = (edge.source().index(), edge.target().index());
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        *edges.entry((a, b)).or_insert(0.0) += edge.weight().weight.max(f64::MIN_POSITIVE);
    }

    let mut membership: Vec<usize> = (0..n).collect();
    let mut level_edges: Vec<(usize, usize, f64)> =
        edges.into_iter().map(|((a, b), w)| (a, b, w)).collect();
    let mut level_size = n;

    loop {
        let (assignment, improved) = louvain_level(level_size, &level_edges);
        if !improved {
            break;
        }

        // relabel original nodes through this level
        for community in membership.iter_mut() {
            *community = assignment[*community];
        }

        // aggregate the graph for the next level
        let next_size = assignment.iter().copied().max().map_or(0, |m| m + 1);
        let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(a, b, w) in &level_edges {
            let (mut ca, mut cb) = (assignment[a], assignment[b]);
            if ca > cb {
                std::mem::swap(&mut ca, &mut cb);
            }
            *merged.entry((ca, cb)).or_insert(0.0) += w;
        }
        if next_size == level_size {
            break;
        }
        level_size = next_size;
        level_edges = merged.into_iter().map(|((a, b), w)| (a, b, w)).collect();
    }

    renumber(&membership)
}

/// One local-moving pass of Louvain. Returns the per-node community
/// assignment and whether any node moved.
fn louvain_level(n: usize, edges: &[(usize, usize, f64)]) -> (Vec<usize>, bool) {
    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut self_weight = vec![0.0; n];
    let mut two_m = 0.0;
    for &(a, b, w) in edges {
        two_m += 2.0 * w;
        if a == b {
            self_weight[a] += w;
        } else {
            adjacency[a].push((b, w));
            adjacency[b].push((a, w));
        }
    }
    if two_m == 0.0 {
        return ((0..n).collect(), false);
    }

    let degree: Vec<f64> = (0..n)
        .map(|i| adjacency[i].iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * self_weight[i])
        .collect();

    let mut community: Vec<usize> = (0..n).collect();
    let mut community_total = degree.clone();
    let mut moved_any = false;

    loop {
        let mut moved_this_pass = false;
        for node in 0..n {
            let current = community[node];
            community_total[current] -= degree[node];

            let mut weight_to: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, w) in &adjacency[node] {
                *weight_to.entry(community[neighbor]).or_insert(0.0) += w;
            }

            let gain_of = |c: usize, w_in: f64| w_in - community_total[c] * degree[node] / two_m;
            let mut best = current;
            let mut best_gain = gain_of(current, weight_to.get(&current).copied().unwrap_or(0.0));
            for (&candidate, &w_in) in &weight_to {
                let gain = gain_of(candidate, w_in);
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best = candidate;
                }
            }

            community_total[best] += degree[node];
            if best != current {
                community[node] = best;
                moved_this_pass = true;
                moved_any = true;
            }
        }
        if !moved_this_pass {
            break;
        }
    }

    (renumber(&community), moved_any)
}

/// Compact community ids into 0..k in first-appearance order.
fn renumber(assignment: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0;
    assignment
        .iter()
        .map(|&c| {
            *mapping.entry(c).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn transfer(from: &str, to: &str, amount: f64) -> Transfer {
        Transfer {
            sender: from.to_string(),
            receiver: to.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tx_hash: format!("0x{}-{}", from, to),
        }
    }

    fn metrics(transfers: &[Transfer]) -> NetworkMetrics {
        match NetworkAnalyzer::analyze(transfers) {
            NetworkAnalysis::Metrics(m) => m,
            NetworkAnalysis::Failed { error } => panic!("analysis failed: {}", error),
        }
    }

    #[test]
    fn test_empty_graph_zeroes() {
        let m = metrics(&[]);
        assert_eq!(m.nodes, 0);
        assert_eq!(m.edges, 0);
        assert_eq!(m.centralization_score, 0.0);
        assert_eq!(m.diameter, Diameter::unavailable());
    }

    #[test]
    fn test_cycle_diameter_and_pagerank() {
        let transfers = vec![
            transfer("a", "b", 1.0),
            transfer("b", "c", 1.0),
            transfer("c", "a", 1.0),
        ];
        let m = metrics(&transfers);
        assert_eq!(m.nodes, 3);
        assert_eq!(m.edges, 3);
        assert_eq!(m.diameter, Diameter::Hops(2));
        // symmetric cycle: uniform pagerank, zero centralization
        let ranks: Vec<f64> = m.pagerank.values().copied().collect();
        assert!((ranks.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(m.centralization_score < 1e-6);
    }

    #[test]
    fn test_disconnected_graph_has_sentinel_diameter() {
        let transfers = vec![transfer("a", "b", 1.0), transfer("c", "d", 1.0)];
        let m = metrics(&transfers);
        assert_eq!(m.diameter, Diameter::unavailable());
        let json = serde_json::to_value(&m.diameter).unwrap();
        assert_eq!(json, serde_json::json!("unavailable"));
    }

    #[test]
    fn test_hub_is_most_central() {
        let mut transfers = Vec::new();
        for i in 0..6 {
            transfers.push(transfer(&format!("spoke{}", i), "hub", 10.0));
            transfers.push(transfer("hub", &format!("spoke{}", i), 10.0));
        }
        let m = metrics(&transfers);
        let hub_rank = m.pagerank["hub"];
        assert!(m
            .pagerank
            .iter()
            .filter(|(k, _)| k.as_str() != "hub")
            .all(|(_, &v)| v < hub_rank));
        assert!(m.centralization_score > 0.5);
        let hub_degree = m.degree_centrality["hub"];
        assert!((hub_degree - 12.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_dense_communities_found() {
        let mut transfers = Vec::new();
        for group in ["x", "y"] {
            for i in 0..4 {
                for j in 0..4 {
                    if i != j {
                        transfers.push(transfer(
                            &format!("{}{}", group, i),
                            &format!("{}{}", group, j),
                            5.0,
                        ));
                    }
                }
            }
        }
        // single weak bridge
        transfers.push(transfer("x0", "y0", 0.001));
        let m = metrics(&transfers);
        assert_eq!(m.communities, 2);
        assert_eq!(m.partition["x1"], m.partition["x3"]);
        assert_eq!(m.partition["y1"], m.partition["y3"]);
        assert_ne!(m.partition["x1"], m.partition["y1"]);
    }

    #[test]
    fn test_betweenness_peaks_on_bridge() {
        // path a -> b -> c: b carries the only a..c path
        let transfers = vec![transfer("a", "b", 1.0), transfer("b", "c", 1.0)];
        let m = metrics(&transfers);
        assert!(m.betweenness_centrality["b"] > m.betweenness_centrality["a"]);
        assert!(m.betweenness_centrality["b"] > m.betweenness_centrality["c"]);
    }
}
