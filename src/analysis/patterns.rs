/// Transaction pattern detection: circular trades, rapid reciprocal
/// trades, high-frequency address pairs, and amount clustering.

use crate::analysis::graph::FlowGraph;
use crate::config::PatternConfig;
use crate::core::Transfer;
use crate::util::stats;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct CircularTrade {
    pub cycle: Vec<String>,
    pub length: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RapidBackForth {
    pub tx1: String,
    pub tx2: String,
    pub time_diff_seconds: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousPair {
    pub sender: String,
    pub receiver: String,
    pub transaction_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousAmount {
    pub amount: f64,
    pub count: u64,
    pub frequency_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmountStatistics {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AmountClustering {
    pub suspicious_amounts: Vec<SuspiciousAmount>,
    pub amount_statistics: Option<AmountStatistics>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternReport {
    pub circular_trades: Vec<CircularTrade>,
    pub circular_trades_by_length: BTreeMap<usize, u64>,
    /// Set when cycle enumeration was capped; the cycle list is partial.
    pub cycle_search_truncated: bool,
    pub rapid_back_forth: Vec<RapidBackForth>,
    pub same_address_pairs: Vec<SuspiciousPair>,
    pub amount_clustering: AmountClustering,
    pub suspicious_addresses: Vec<String>,
}

pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, transfers: &[Transfer]) -> PatternReport {
        if transfers.is_empty() {
            return PatternReport::default();
        }
        info!("🔍 Analyzing transaction patterns over {} transfers", transfers.len());

        let (circular_trades, truncated) = self.detect_circular_trades(transfers);
        let mut by_length: BTreeMap<usize, u64> = BTreeMap::new();
        for trade in &circular_trades {
            *by_length.entry(trade.length).or_insert(0) += 1;
        }

        let same_address_pairs = self.detect_same_address_pairs(transfers);
        let suspicious_addresses: Vec<String> = same_address_pairs
            .iter()
            .flat_map(|p| [p.sender.clone(), p.receiver.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        PatternReport {
            circular_trades,
            circular_trades_by_length: by_length,
            cycle_search_truncated: truncated,
            rapid_back_forth: self.detect_rapid_back_forth(transfers),
            same_address_pairs,
            amount_clustering: self.detect_amount_clustering(transfers),
            suspicious_addresses,
        }
    }

    /// Enumerate closed loops of flow between 2 and 6 addresses. Returns
    /// the cycles found plus whether the bounded search was cut short.
    pub fn detect_circular_trades(&self, transfers: &[Transfer]) -> (Vec<CircularTrade>, bool) {
        let flow = FlowGraph::from_transfers(transfers);
        let search = flow.simple_cycles(&self.config.cycles);
        debug!(
            "cycle search: {} cycles, truncated={}",
            search.cycles.len(),
            search.truncated
        );

        let trades = search
            .cycles
            .iter()
            .map(|cycle| {
                let mut amounts = Vec::with_capacity(cycle.len());
                for i in 0..cycle.len() {
                    let from = cycle[i];
                    let to = cycle[(i + 1) % cycle.len()];
                    if let Some(edge) = flow.edge_flow(from, to) {
                        amounts.push(edge.weight);
                    }
                }
                let total: f64 = amounts.iter().sum();
                let avg = if amounts.is_empty() {
                    0.0
                } else {
                    total / amounts.len() as f64
                };
                CircularTrade {
                    cycle: cycle.iter().map(|&n| flow.address(n).to_string()).collect(),
                    length: cycle.len(),
                    total_amount: total,
                    avg_amount: avg,
                }
            })
            .collect();
        (trades, search.truncated)
    }

    /// Flag adjacent list entries forming an A->B then B->A pattern inside
    /// the rapid window.
    ///
    /// Known limitation: only consecutive entries are compared, so
    /// reciprocal pairs separated by other records are missed when the
    /// input is not strictly chronological.
    pub fn detect_rapid_back_forth(&self, transfers: &[Transfer]) -> Vec<RapidBackForth> {
        let mut found = Vec::new();
        for pair in transfers.windows(2) {
            let (prev, current) = (&pair[0], &pair[1]);
            if prev.receiver == current.sender && prev.sender == current.receiver {
                let diff = (current.timestamp - prev.timestamp).num_seconds();
                if diff.abs() < self.config.rapid_window_seconds {
                    found.push(RapidBackForth {
                        tx1: prev.tx_hash.clone(),
                        tx2: current.tx_hash.clone(),
                        time_diff_seconds: diff as f64,
                        amount: current.amount,
                    });
                }
            }
        }
        found
    }

    /// Ordered (sender, receiver) pairs trading more often than the
    /// threshold suggest coordinated behavior.
    pub fn detect_same_address_pairs(&self, transfers: &[Transfer]) -> Vec<SuspiciousPair> {
        let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
        for transfer in transfers {
            *counts
                .entry((transfer.sender.clone(), transfer.receiver.clone()))
                .or_insert(0) += 1;
        }
        counts
            .into_iter()
            .filter(|&(_, count)| count > self.config.pair_count_threshold)
            .map(|((sender, receiver), count)| SuspiciousPair {
                sender,
                receiver,
                transaction_count: count,
            })
            .collect()
    }

    /// An amount is suspicious when it repeats more than the occurrence
    /// threshold, sits above the median, and makes up more than the
    /// configured share of all transfers. The triple condition avoids
    /// flagging legitimate round-number dust.
    pub fn detect_amount_clustering(&self, transfers: &[Transfer]) -> AmountClustering {
        let amounts: Vec<f64> = transfers.iter().map(|t| t.amount).collect();
        if amounts.is_empty() {
            return AmountClustering::default();
        }

        // Round to 6 decimals so nearly identical amounts collapse together.
        let mut counts: HashMap<i64, u64> = HashMap::new();
        for &amount in &amounts {
            *counts.entry(to_micros(amount)).or_insert(0) += 1;
        }

        let statistics = AmountStatistics {
            mean: stats::mean(&amounts),
            std: stats::std_dev(&amounts),
            median: stats::median(&amounts),
            q1: stats::percentile(&amounts, 25.0),
            q3: stats::percentile(&amounts, 75.0),
        };

        let total = amounts.len() as f64;
        let mut suspicious: Vec<SuspiciousAmount> = counts
            .into_iter()
            .filter_map(|(micros, count)| {
                let amount = micros as f64 / 1e6;
                let frequency_ratio = count as f64 / total;
                let clustered = count > self.config.amount_occurrence_threshold
                    && amount > statistics.median
                    && frequency_ratio > self.config.amount_frequency_ratio;
                clustered.then_some(SuspiciousAmount {
                    amount,
                    count,
                    frequency_ratio,
                })
            })
            .collect();
        suspicious.sort_by(|a, b| a.amount.partial_cmp(&b.amount).unwrap_or(std::cmp::Ordering::Equal));

        AmountClustering {
            suspicious_amounts: suspicious,
            amount_statistics: Some(statistics),
        }
    }
}

fn to_micros(amount: f64) -> i64 {
    (amount * 1e6).round() as i64
}
