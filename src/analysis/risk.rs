/// Weighted risk scoring over the computed signal bundle
///
/// Pure and deterministic: identical signals always produce the identical
/// score. Each signal contributes a capped sub-score; the capped sum is
/// itself capped at 100 and rounded to the reported integer.

use crate::analysis::clustering::ClusteringReport;
use crate::analysis::network::NetworkAnalysis;
use crate::analysis::patterns::PatternReport;
use crate::analysis::time_anomaly::TimeAnomaly;
use crate::analysis::volume::VolumeReport;
use crate::core::RiskTier;
use serde::Serialize;

const MAX_SCORE: f64 = 100.0;

/// Immutable bundle of detector outputs, consumed by the scorer and the
/// report layer.
#[derive(Debug, Serialize)]
pub struct RiskSignals {
    pub patterns: PatternReport,
    pub time_anomalies: Vec<TimeAnomaly>,
    pub network_metrics: NetworkAnalysis,
    pub volume_analysis: VolumeReport,
    pub address_clustering: ClusteringReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskBreakdown {
    pub circular_trades: f64,
    pub rapid_back_forth: f64,
    pub time_anomalies: f64,
    pub network_centralization: f64,
    pub volume_anomalies: f64,
    pub suspicious_pairs: f64,
    pub amount_clustering: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub risk_score: u8,
    pub risk_tier: RiskTier,
    pub breakdown: RiskBreakdown,
}

pub struct RiskScorer;

impl RiskScorer {
    pub fn score(signals: &RiskSignals) -> RiskAssessment {
        // Circular trades, 25-point cap; longer cycles weigh more.
        let mut circular = 0.0;
        for (&length, &count) in &signals.patterns.circular_trades_by_length {
            let per_cycle = match length {
                2 => 5.0,
                3 => 10.0,
                _ => 15.0,
            };
            circular += count as f64 * per_cycle;
        }

        let breakdown = RiskBreakdown {
            circular_trades: circular.min(25.0),
            rapid_back_forth: (signals.patterns.rapid_back_forth.len() as f64 * 2.0).min(15.0),
            time_anomalies: (signals.time_anomalies.len() as f64 * 0.5).min(20.0),
            network_centralization: (signals.network_metrics.centralization_score() * 30.0)
                .min(15.0),
            volume_anomalies: (signals.volume_analysis.anomalous_buckets.len() as f64 * 3.0)
                .min(10.0),
            suspicious_pairs: (signals.patterns.same_address_pairs.len() as f64).min(10.0),
            amount_clustering: (signals.patterns.amount_clustering.suspicious_amounts.len()
                as f64
                * 2.0)
                .min(5.0),
        };

        let total = (breakdown.circular_trades
            + breakdown.rapid_back_forth
            + breakdown.time_anomalies
            + breakdown.network_centralization
            + breakdown.volume_anomalies
            + breakdown.suspicious_pairs
            + breakdown.amount_clustering)
            .min(MAX_SCORE);
        let risk_score = total.round() as u8;

        RiskAssessment {
            risk_score,
            risk_tier: RiskTier::from_score(risk_score),
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::clustering::ClusteringReport;
    use crate::analysis::network::{NetworkAnalysis, NetworkAnalyzer};
    use crate::analysis::patterns::{PatternReport, RapidBackForth, SuspiciousPair};
    use crate::analysis::volume::VolumeReport;

    fn empty_signals() -> RiskSignals {
        RiskSignals {
            patterns: PatternReport::default(),
            time_anomalies: Vec::new(),
            network_metrics: NetworkAnalyzer::analyze(&[]),
            volume_analysis: VolumeReport::default(),
            address_clustering: ClusteringReport::InsufficientData {
                error: "Not enough data for meaningful clustering".to_string(),
            },
        }
    }

    #[test]
    fn test_empty_signals_score_zero() {
        let assessment = RiskScorer::score(&empty_signals());
        assert_eq!(assessment.risk_score, 0);
        assert_eq!(assessment.risk_tier, RiskTier::Low);
    }

    #[test]
    fn test_cycle_length_weighting_and_cap() {
        let mut signals = empty_signals();
        signals
            .patterns
            .circular_trades_by_length
            .extend([(2usize, 1u64), (3, 1), (5, 1)]);
        let assessment = RiskScorer::score(&signals);
        // 5 + 10 + 15 = 30, capped at 25
        assert_eq!(assessment.breakdown.circular_trades, 25.0);
        assert_eq!(assessment.risk_score, 25);
    }

    #[test]
    fn test_component_caps_hold() {
        let mut signals = empty_signals();
        for i in 0..50 {
            signals.patterns.rapid_back_forth.push(RapidBackForth {
                tx1: format!("0xa{}", i),
                tx2: format!("0xb{}", i),
                time_diff_seconds: 60.0,
                amount: 1.0,
            });
            signals.patterns.same_address_pairs.push(SuspiciousPair {
                sender: format!("s{}", i),
                receiver: format!("r{}", i),
                transaction_count: 20,
            });
        }
        let assessment = RiskScorer::score(&signals);
        assert_eq!(assessment.breakdown.rapid_back_forth, 15.0);
        assert_eq!(assessment.breakdown.suspicious_pairs, 10.0);
        assert!(assessment.risk_score <= 100);
    }

    #[test]
    fn test_failed_network_contributes_zero() {
        let mut signals = empty_signals();
        signals.network_metrics = NetworkAnalysis::Failed {
            error: "pagerank failed to converge".to_string(),
        };
        let assessment = RiskScorer::score(&signals);
        assert_eq!(assessment.breakdown.network_centralization, 0.0);
    }

    #[test]
    fn test_score_bounded() {
        let mut signals = empty_signals();
        signals
            .patterns
            .circular_trades_by_length
            .extend([(4usize, 1000u64)]);
        for i in 0..1000 {
            signals.patterns.rapid_back_forth.push(RapidBackForth {
                tx1: format!("0x{}", i),
                tx2: format!("0x{}", i + 1),
                time_diff_seconds: 1.0,
                amount: 1.0,
            });
        }
        let assessment = RiskScorer::score(&signals);
        assert!(assessment.risk_score <= 100);
    }
}
