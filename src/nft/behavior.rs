/// Behavioral analysis over a reconstructed ownership chain
///
/// Ownership-duration, cyclic-trade and outlier detection analogous to
/// the fungible-token detectors, adapted to the single-owner semantics
/// of an NFT.

use crate::analysis::graph::FlowGraph;
use crate::config::NftConfig;
use crate::ml::{Dbscan, StandardScaler};
use crate::nft::chain::{HopTiming, MovementChain};
use crate::util::stats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct RapidTransfer {
    #[serde(flatten)]
    pub hop: HopTiming,
    pub suspicion_level: Severity,
    pub reason: String,
}

/// Immediate A -> B -> A flip within the chain.
#[derive(Debug, Clone, Serialize)]
pub struct BackAndForth {
    pub cycle: Vec<String>,
    pub transactions: Vec<String>,
    pub time_between_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainCycle {
    pub cycle: Vec<String>,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CyclicTrades {
    pub two_node_cycles: Vec<BackAndForth>,
    pub three_node_cycles: Vec<ChainCycle>,
    pub complex_cycles: Vec<ChainCycle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnershipStats {
    pub ownership_count: u64,
    pub total_duration_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration_hours: Option<f64>,
    pub transactions: Vec<String>,
    pub first_acquired: DateTime<Utc>,
    pub last_transferred: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeStatistics {
    pub mean_hours: f64,
    pub median_hours: f64,
    pub std_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    pub q1_hours: f64,
    pub q3_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalousAddress {
    pub address: String,
    pub features: Vec<f64>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BehaviorAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_statistics: Option<TimeStatistics>,
    pub time_outliers: Vec<HopTiming>,
    pub rapid_transfers: Vec<RapidTransfer>,
    pub cyclic_trades: CyclicTrades,
    pub ownership_patterns: BTreeMap<String, OwnershipStats>,
    pub anomalous_addresses: Vec<AnomalousAddress>,
    pub total_transfers: usize,
    pub unique_owners: usize,
}

pub struct NftBehaviorAnalyzer {
    config: NftConfig,
}

impl NftBehaviorAnalyzer {
    pub fn new(config: NftConfig) -> Self {
        Self { config }
    }

    /// Full behavior pass over one chain. An empty chain (no mint found)
    /// reports zero transfers without failing.
    pub fn analyze(&self, chain: &MovementChain) -> BehaviorAnalysis {
        if chain.is_empty() {
            return BehaviorAnalysis::default();
        }
        info!("🔍 Analyzing ownership behavior over {} chain links", chain.len());

        let hops = chain.hop_timings();
        let ownership_patterns = ownership_patterns(chain);
        let (time_statistics, time_outliers) = self.hop_outliers(&hops);
        let anomalous_addresses = self.behavioral_outliers(&ownership_patterns);

        BehaviorAnalysis {
            time_statistics,
            time_outliers,
            rapid_transfers: self.detect_rapid_transfers(&hops),
            cyclic_trades: self.detect_cyclic_trades(chain, &hops),
            unique_owners: ownership_patterns.len(),
            ownership_patterns,
            anomalous_addresses,
            total_transfers: chain.len(),
        }
    }

    /// Hops faster than the threshold are flagged; under an hour the flip
    /// is barely distinguishable from a scripted trade.
    pub fn detect_rapid_transfers(&self, hops: &[HopTiming]) -> Vec<RapidTransfer> {
        hops.iter()
            .filter(|hop| hop.time_diff_hours < self.config.rapid_threshold_hours)
            .map(|hop| RapidTransfer {
                suspicion_level: if hop.time_diff_hours < self.config.high_severity_hours {
                    Severity::High
                } else {
                    Severity::Medium
                },
                reason: format!(
                    "Transfer occurred within {:.2} hours",
                    hop.time_diff_hours
                ),
                hop: hop.clone(),
            })
            .collect()
    }

    /// Adjacent-hop flips plus bounded cycle enumeration over the chain's
    /// induced graph for longer loops.
    pub fn detect_cyclic_trades(&self, chain: &MovementChain, hops: &[HopTiming]) -> CyclicTrades {
        let mut cycles = CyclicTrades::default();

        for (i, pair) in chain.links.windows(2).enumerate() {
            if pair[1].receiver == pair[0].sender {
                cycles.two_node_cycles.push(BackAndForth {
                    cycle: vec![
                        pair[0].sender.clone(),
                        pair[0].receiver.clone(),
                        pair[0].sender.clone(),
                    ],
                    transactions: vec![pair[0].tx_hash.clone(), pair[1].tx_hash.clone()],
                    time_between_hours: hops[i].time_diff_hours,
                });
            }
        }

        let flow = FlowGraph::from_transfers(&chain.links);
        let search = flow.simple_cycles(&self.config.cycles);
        for cycle in &search.cycles {
            let named: Vec<String> = cycle.iter().map(|&n| flow.address(n).to_string()).collect();
            match named.len() {
                0..=2 => {}
                3 => cycles.three_node_cycles.push(ChainCycle {
                    length: 3,
                    cycle: named,
                }),
                length => cycles.complex_cycles.push(ChainCycle {
                    length,
                    cycle: named,
                }),
            }
        }
        cycles
    }

    /// IQR fences over the hop-hour distribution.
    fn hop_outliers(&self, hops: &[HopTiming]) -> (Option<TimeStatistics>, Vec<HopTiming>) {
        if hops.is_empty() {
            return (None, Vec::new());
        }
        let hours: Vec<f64> = hops.iter().map(|h| h.time_diff_hours).collect();
        let statistics = TimeStatistics {
            mean_hours: stats::mean(&hours),
            median_hours: stats::median(&hours),
            std_hours: stats::std_dev(&hours),
            min_hours: hours.iter().cloned().fold(f64::INFINITY, f64::min),
            max_hours: hours.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            q1_hours: stats::percentile(&hours, 25.0),
            q3_hours: stats::percentile(&hours, 75.0),
        };
        let (lower, upper) = stats::iqr_bounds(&hours, self.config.hop_iqr_multiplier);
        let outliers = hops
            .iter()
            .filter(|h| h.time_diff_hours < lower || h.time_diff_hours > upper)
            .cloned()
            .collect();
        (Some(statistics), outliers)
    }

    /// Density clustering over (ownership count, held duration, tx count);
    /// owners outside every dense cluster are behavioral outliers.
    fn behavioral_outliers(
        &self,
        ownership: &BTreeMap<String, OwnershipStats>,
    ) -> Vec<AnomalousAddress> {
        if ownership.len() <= self.config.min_owners {
            return Vec::new();
        }
        let owners: Vec<&String> = ownership.keys().collect();
        let features: Vec<Vec<f64>> = owners
            .iter()
            .map(|owner| {
                let stats = &ownership[*owner];
                vec![
                    stats.ownership_count as f64,
                    stats.total_duration_hours,
                    stats.transactions.len() as f64,
                ]
            })
            .collect();

        let scaled = StandardScaler::fit_transform(&features);
        let labels = Dbscan::new(self.config.dbscan_eps, self.config.dbscan_min_samples)
            .fit(&scaled);

        labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.is_none())
            .map(|(i, _)| AnomalousAddress {
                address: owners[i].clone(),
                features: features[i].clone(),
                reason: "Behavioral outlier based on ownership patterns".to_string(),
            })
            .collect()
    }
}

/// Per-owner acquisition stats. Duration is the span between the first
/// acquisition and the last transfer-in across repeated ownership.
fn ownership_patterns(chain: &MovementChain) -> BTreeMap<String, OwnershipStats> {
    let mut ownership: BTreeMap<String, OwnershipStats> = BTreeMap::new();
    for transfer in &chain.links {
        let entry = ownership
            .entry(transfer.receiver.clone())
            .or_insert_with(|| OwnershipStats {
                ownership_count: 0,
                total_duration_hours: 0.0,
                avg_duration_hours: None,
                transactions: Vec::new(),
                first_acquired: transfer.timestamp,
                last_transferred: transfer.timestamp,
            });
        entry.ownership_count += 1;
        entry.transactions.push(transfer.tx_hash.clone());
        entry.last_transferred = transfer.timestamp;
    }
    for stats in ownership.values_mut() {
        if stats.ownership_count > 1 {
            let duration =
                (stats.last_transferred - stats.first_acquired).num_seconds() as f64 / 3600.0;
            stats.total_duration_hours = duration;
            stats.avg_duration_hours = Some(duration / stats.ownership_count as f64);
        }
    }
    ownership
}
