/// Volume analysis over fixed time windows
///
/// Buckets transfers by window start and flags windows whose total volume
/// breaks the IQR fence of all bucket totals. Volume spikes indicate
/// coordinated trading activity.

use crate::config::VolumeConfig;
use crate::core::Transfer;
use crate::util::stats;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct BucketStats {
    pub total_volume: f64,
    pub avg_volume: f64,
    pub median_volume: f64,
    pub max_volume: f64,
    pub min_volume: f64,
    pub transaction_count: usize,
    pub volume_variance: f64,
    pub volume_std: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeReport {
    pub bucket_stats: BTreeMap<DateTime<Utc>, BucketStats>,
    pub anomalous_buckets: BTreeMap<DateTime<Utc>, BucketStats>,
    pub total_time_periods: usize,
}

pub struct VolumeAnalyzer {
    config: VolumeConfig,
}

impl VolumeAnalyzer {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, transfers: &[Transfer]) -> VolumeReport {
        if transfers.is_empty() {
            return VolumeReport::default();
        }
        info!("📊 Analyzing volume patterns in {}h windows", self.config.window_hours);

        let window_seconds = self.config.window_hours.max(1) * 3600;
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        for transfer in transfers {
            let floored = transfer.timestamp.timestamp().div_euclid(window_seconds) * window_seconds;
            let key = Utc
                .timestamp_opt(floored, 0)
                .single()
                .unwrap_or(transfer.timestamp);
            buckets.entry(key).or_default().push(transfer.amount);
        }

        let bucket_stats: BTreeMap<DateTime<Utc>, BucketStats> = buckets
            .into_iter()
            .map(|(key, amounts)| {
                (
                    key,
                    BucketStats {
                        total_volume: amounts.iter().sum(),
                        avg_volume: stats::mean(&amounts),
                        median_volume: stats::median(&amounts),
                        max_volume: amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                        min_volume: amounts.iter().cloned().fold(f64::INFINITY, f64::min),
                        transaction_count: amounts.len(),
                        volume_variance: stats::variance(&amounts),
                        volume_std: stats::std_dev(&amounts),
                    },
                )
            })
            .collect();

        let totals: Vec<f64> = bucket_stats
            .values()
            .map(|s| s.total_volume)
            .filter(|&v| v > 0.0)
            .collect();

        // the IQR fence is meaningless on a handful of windows
        let anomalous_buckets = if totals.len() >= self.config.min_buckets {
            let (_, upper) = stats::iqr_bounds(&totals, self.config.iqr_multiplier);
            bucket_stats
                .iter()
                .filter(|(_, s)| s.total_volume > upper)
                .map(|(k, s)| (*k, s.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };

        VolumeReport {
            total_time_periods: bucket_stats.len(),
            bucket_stats,
            anomalous_buckets,
        }
    }
}
