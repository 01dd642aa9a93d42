/// Timing anomaly detection over the (time, amount) plane
///
/// Two independent unsupervised methods vote on each transfer; only
/// agreement between both is reported, which keeps the false-positive
/// rate below either method alone.

use crate::config::TimeAnomalyConfig;
use crate::core::Transfer;
use crate::ml::{IsolationForest, LocalOutlierFactor};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct TimeAnomaly {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub is_iso_anomaly: bool,
    pub is_lof_anomaly: bool,
    pub anomaly_score: f64,
}

pub struct TimeAnomalyDetector {
    config: TimeAnomalyConfig,
}

impl TimeAnomalyDetector {
    pub fn new(config: TimeAnomalyConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, transfers: &[Transfer]) -> Vec<TimeAnomaly> {
        if transfers.len() < 2 {
            return Vec::new();
        }
        info!("⏰ Analyzing time anomalies over {} transfers", transfers.len());

        let features = normalize_features(transfers);

        let forest = IsolationForest::new(
            self.config.isolation_trees,
            self.config.contamination,
            self.config.seed,
        );
        let iso = forest.fit_predict(&features);

        let lof = LocalOutlierFactor::new(self.config.lof_neighbors, self.config.contamination);
        let lof_flags = lof.fit_predict(&features);

        transfers
            .iter()
            .enumerate()
            .filter(|&(i, _)| iso.outliers[i] && lof_flags[i])
            .map(|(i, transfer)| TimeAnomaly {
                index: i,
                timestamp: transfer.timestamp,
                amount: transfer.amount,
                is_iso_anomaly: true,
                is_lof_anomaly: true,
                anomaly_score: iso.scores[i],
            })
            .collect()
    }
}

/// Min-max scale timestamps and amounts into [0, 1]; the denominator
/// floors at 1 so degenerate ranges never divide by zero.
fn normalize_features(transfers: &[Transfer]) -> Vec<Vec<f64>> {
    let times: Vec<f64> = transfers
        .iter()
        .map(|t| t.timestamp.timestamp() as f64)
        .collect();
    let amounts: Vec<f64> = transfers.iter().map(|t| t.amount).collect();

    let t_min = times.iter().cloned().fold(f64::INFINITY, f64::min);
    let t_span = (times.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - t_min).max(1.0);
    let a_min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let a_span = (amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - a_min).max(1.0);

    times
        .iter()
        .zip(amounts.iter())
        .map(|(&t, &a)| vec![(t - t_min) / t_span, (a - a_min) / a_span])
        .collect()
}
