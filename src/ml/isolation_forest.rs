/// Isolation forest for unsupervised outlier scoring
///
/// Points that isolate in fewer random splits score closer to 1. The
/// forest is seeded, so identical inputs always produce identical scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Split {
        dim: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

struct Tree {
    nodes: Vec<Node>,
}

pub struct IsolationForest {
    n_trees: usize,
    contamination: f64,
    seed: u64,
}

#[derive(Debug)]
pub struct IsolationFit {
    /// Anomaly score per input row, higher = more isolated.
    pub scores: Vec<f64>,
    pub outliers: Vec<bool>,
}

impl IsolationForest {
    pub fn new(n_trees: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_trees,
            contamination,
            seed,
        }
    }

    pub fn fit_predict(&self, rows: &[Vec<f64>]) -> IsolationFit {
        let n = rows.len();
        if n == 0 {
            return IsolationFit {
                scores: Vec::new(),
                outliers: Vec::new(),
            };
        }

        let sample_size = n.min(256);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut trees = Vec::with_capacity(self.n_trees);
        for _ in 0..self.n_trees {
            let sample = sample_indices(n, sample_size, &mut rng);
            let mut tree = Tree { nodes: Vec::new() };
            build_node(rows, &sample, 0, max_depth, &mut tree, &mut rng);
            trees.push(tree);
        }

        let normalizer = average_path_length(sample_size);
        let scores: Vec<f64> = rows
            .iter()
            .map(|row| {
                let avg_path = trees
                    .iter()
                    .map(|tree| path_length(tree, 0, row, 0.0))
                    .sum::<f64>()
                    / trees.len() as f64;
                2f64.powf(-avg_path / normalizer)
            })
            .collect();

        IsolationFit {
            outliers: flag_top_fraction(&scores, self.contamination),
            scores,
        }
    }
}

/// Mark the highest-scoring `fraction` of rows as outliers; ties broken by
/// index for determinism.
pub fn flag_top_fraction(scores: &[f64], fraction: f64) -> Vec<bool> {
    let n = scores.len();
    let cutoff = ((n as f64) * fraction).round() as usize;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut flags = vec![false; n];
    for &idx in order.iter().take(cutoff) {
        flags[idx] = true;
    }
    flags
}

fn sample_indices(n: usize, size: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..size.min(n) {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(size.min(n));
    pool
}

fn build_node(
    rows: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    tree: &mut Tree,
    rng: &mut StdRng,
) -> usize {
    if indices.len() <= 1 || depth >= max_depth {
        tree.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        return tree.nodes.len() - 1;
    }

    let dims = rows[indices[0]].len();
    // Pick a random dimension with spread; a fully constant region is a leaf.
    let start = rng.gen_range(0..dims);
    let mut chosen = None;
    for offset in 0..dims {
        let dim = (start + offset) % dims;
        let lo = indices
            .iter()
            .map(|&i| rows[i][dim])
            .fold(f64::INFINITY, f64::min);
        let hi = indices
            .iter()
            .map(|&i| rows[i][dim])
            .fold(f64::NEG_INFINITY, f64::max);
        if hi > lo {
            chosen = Some((dim, lo, hi));
            break;
        }
    }
    let (dim, lo, hi) = match chosen {
        Some(found) => found,
        None => {
            tree.nodes.push(Node::Leaf {
                size: indices.len(),
            });
            return tree.nodes.len() - 1;
        }
    };

    let threshold = lo + rng.gen::<f64>() * (hi - lo);
    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][dim] < threshold);

    let slot = tree.nodes.len();
    tree.nodes.push(Node::Leaf { size: 0 }); // placeholder
    let left = build_node(rows, &left_idx, depth + 1, max_depth, tree, rng);
    let right = build_node(rows, &right_idx, depth + 1, max_depth, tree, rng);
    tree.nodes[slot] = Node::Split {
        dim,
        threshold,
        left,
        right,
    };
    slot
}

fn path_length(tree: &Tree, node: usize, row: &[f64], depth: f64) -> f64 {
    match &tree.nodes[node] {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            dim,
            threshold,
            left,
            right,
        } => {
            let next = if row[*dim] < *threshold { *left } else { *right };
            path_length(tree, next, row, depth + 1.0)
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
