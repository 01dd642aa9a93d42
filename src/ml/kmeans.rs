/// Seeded k-means with k-means++ initialization

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
}

#[derive(Debug)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: 300,
        }
    }

    pub fn fit(&self, rows: &[Vec<f64>]) -> KMeansFit {
        let n = rows.len();
        if n == 0 {
            return KMeansFit {
                labels: Vec::new(),
                centroids: Vec::new(),
            };
        }
        let k = self.k.min(n).max(1);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_plus_plus(rows, k, &mut rng);
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (i, row) in rows.iter().enumerate() {
                let nearest = nearest_centroid(row, &centroids);
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            // Recompute centroids; an emptied cluster keeps its position.
            let dims = rows[0].len();
            let mut sums = vec![vec![0.0; dims]; k];
            let mut counts = vec![0usize; k];
            for (i, row) in rows.iter().enumerate() {
                counts[labels[i]] += 1;
                for d in 0..dims {
                    sums[labels[i]][d] += row[d];
                }
            }
            for c in 0..k {
                if counts[c] > 0 {
                    for d in 0..dims {
                        centroids[c][d] = sums[c][d] / counts[c] as f64;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        KMeansFit { labels, centroids }
    }
}

fn init_plus_plus(rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut centroids = vec![rows[rng.gen_range(0..n)].clone()];

    while centroids.len() < k {
        let weights: Vec<f64> = rows
            .iter()
            .map(|row| {
                centroids
                    .iter()
                    .map(|c| squared_distance(row, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total == 0.0 {
            // all points coincide with existing centroids
            centroids.push(rows[rng.gen_range(0..n)].clone());
            continue;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = n - 1;
        for (i, w) in weights.iter().enumerate() {
            target -= w;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(rows[chosen].clone());
    }
    centroids
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(vec![0.0 + (i % 3) as f64 * 0.1, 0.0]);
            rows.push(vec![10.0 + (i % 3) as f64 * 0.1, 10.0]);
        }
        rows
    }

    #[test]
    fn test_separates_blobs() {
        let rows = two_blobs();
        let fit = KMeans::new(2, 42).fit(&rows);
        // all even indices in one cluster, all odd in the other
        let first = fit.labels[0];
        let second = fit.labels[1];
        assert_ne!(first, second);
        for i in (0..rows.len()).step_by(2) {
            assert_eq!(fit.labels[i], first);
        }
        for i in (1..rows.len()).step_by(2) {
            assert_eq!(fit.labels[i], second);
        }
    }

    #[test]
    fn test_deterministic() {
        let rows = two_blobs();
        let a = KMeans::new(3, 9).fit(&rows);
        let b = KMeans::new(3, 9).fit(&rows);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_k_clamps_to_sample_count() {
        let rows = vec![vec![1.0], vec![2.0]];
        let fit = KMeans::new(5, 1).fit(&rows);
        assert_eq!(fit.centroids.len(), 2);
    }
}
