/// Local outlier factor over a small feature space
///
/// Compares each point's local reachability density against its
/// neighborhood's; sparse points relative to their neighbors score above 1.
/// Brute-force distances are fine at the transfer-list sizes we analyze.

use super::isolation_forest::flag_top_fraction;

pub struct LocalOutlierFactor {
    n_neighbors: usize,
    contamination: f64,
}

impl LocalOutlierFactor {
    pub fn new(n_neighbors: usize, contamination: f64) -> Self {
        Self {
            n_neighbors,
            contamination,
        }
    }

    /// Flags the `contamination` fraction of rows with the highest LOF
    /// score. The neighborhood size clamps to (rows - 1) for tiny inputs.
    pub fn fit_predict(&self, rows: &[Vec<f64>]) -> Vec<bool> {
        let n = rows.len();
        if n < 2 {
            return vec![false; n];
        }
        let k = self.n_neighbors.min(n - 1).max(1);

        // Pairwise distances with deterministic neighbor ordering.
        let mut neighbors: Vec<Vec<(f64, usize)>> = Vec::with_capacity(n);
        for i in 0..n {
            let mut dists: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (euclidean(&rows[i], &rows[j]), j))
                .collect();
            dists.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            dists.truncate(k);
            neighbors.push(dists);
        }

        let k_distance: Vec<f64> = neighbors.iter().map(|d| d[d.len() - 1].0).collect();

        // Local reachability density; duplicate points collapse to an
        // infinite density and are treated as maximally inlying.
        let lrd: Vec<f64> = (0..n)
            .map(|i| {
                let reach_sum: f64 = neighbors[i]
                    .iter()
                    .map(|&(dist, j)| dist.max(k_distance[j]))
                    .sum();
                if reach_sum > 0.0 {
                    neighbors[i].len() as f64 / reach_sum
                } else {
                    f64::INFINITY
                }
            })
            .collect();

        let scores: Vec<f64> = (0..n)
            .map(|i| {
                if lrd[i].is_infinite() {
                    return 1.0;
                }
                let ratio_sum: f64 = neighbors[i]
                    .iter()
                    .map(|&(_, j)| {
                        if lrd[j].is_infinite() {
                            1.0
                        } else {
                            lrd[j] / lrd[i]
                        }
                    })
                    .sum();
                ratio_sum / neighbors[i].len() as f64
            })
            .collect();

        flag_top_fraction(&scores, self.contamination)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
