/// Analysis configuration with TOML loading
///
/// Every empirical threshold used by the detectors lives here so the
/// tuning knobs can be adjusted per deployment without code changes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub patterns: PatternConfig,
    pub time_anomaly: TimeAnomalyConfig,
    pub volume: VolumeConfig,
    pub clustering: ClusteringConfig,
    pub nft: NftConfig,
}

/// Bounds for simple-cycle enumeration on the flow graph. Enumeration on
/// larger graphs is skipped, and searches stop once `max_cycles` cycles
/// have been collected; both cases surface as a truncated partial result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleBounds {
    pub min_length: usize,
    pub max_length: usize,
    pub max_nodes: usize,
    pub max_cycles: usize,
}

impl Default for CycleBounds {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_length: 6,
            max_nodes: 150,
            max_cycles: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Reciprocal adjacent transfers closer than this are rapid back-and-forth.
    pub rapid_window_seconds: i64,
    /// Ordered (sender, receiver) pairs above this count are suspicious.
    pub pair_count_threshold: u64,
    /// Occurrence count an amount must exceed to be considered clustered.
    pub amount_occurrence_threshold: u64,
    /// Share of all transfers an amount must exceed to be considered clustered.
    pub amount_frequency_ratio: f64,
    pub cycles: CycleBounds,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            rapid_window_seconds: 3600,
            pair_count_threshold: 10,
            amount_occurrence_threshold: 5,
            amount_frequency_ratio: 0.01,
            cycles: CycleBounds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAnomalyConfig {
    /// Expected outlier fraction for both unsupervised methods.
    pub contamination: f64,
    pub isolation_trees: usize,
    pub lof_neighbors: usize,
    pub seed: u64,
}

impl Default for TimeAnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.15,
            isolation_trees: 100,
            lof_neighbors: 20,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub window_hours: i64,
    /// Buckets above Q3 + multiplier * IQR of bucket totals are anomalous.
    /// 2.5 is the conservative default for naturally bursty volume.
    pub iqr_multiplier: f64,
    /// Minimum nonzero-volume buckets required for the statistical test.
    pub min_buckets: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            window_hours: 6,
            iqr_multiplier: 2.5,
            min_buckets: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Clustering runs only with strictly more addresses than this.
    pub min_addresses: usize,
    pub min_clusters: usize,
    pub max_clusters: usize,
    /// Cluster count target is one cluster per this many addresses.
    pub addresses_per_cluster: usize,
    pub seed: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_addresses: 10,
            min_clusters: 3,
            max_clusters: 8,
            addresses_per_cluster: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NftConfig {
    /// Hops faster than this are flagged as rapid transfers.
    pub rapid_threshold_hours: f64,
    /// Hops faster than this escalate the rapid flag to HIGH severity.
    pub high_severity_hours: f64,
    pub hop_iqr_multiplier: f64,
    pub dbscan_eps: f64,
    pub dbscan_min_samples: usize,
    /// Behavioral outlier detection needs strictly more owners than this.
    pub min_owners: usize,
    pub cycles: CycleBounds,
}

impl Default for NftConfig {
    fn default() -> Self {
        Self {
            rapid_threshold_hours: 24.0,
            high_severity_hours: 1.0,
            hop_iqr_multiplier: 1.5,
            dbscan_eps: 1.0,
            dbscan_min_samples: 2,
            min_owners: 2,
            cycles: CycleBounds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}
