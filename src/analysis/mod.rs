/// Analysis engine: five independent detectors over one immutable
/// transfer snapshot, a join barrier, then the risk scorer.

pub mod clustering;
pub mod graph;
pub mod network;
pub mod patterns;
pub mod risk;
pub mod time_anomaly;
pub mod volume;

pub use clustering::{AddressClusterer, ClusteringReport};
pub use network::{Diameter, NetworkAnalysis, NetworkAnalyzer, NetworkMetrics};
pub use patterns::{PatternDetector, PatternReport};
pub use risk::{RiskAssessment, RiskBreakdown, RiskScorer, RiskSignals};
pub use time_anomaly::{TimeAnomaly, TimeAnomalyDetector};
pub use volume::{VolumeAnalyzer, VolumeReport};

use crate::config::AnalysisConfig;
use crate::core::Transfer;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("detector task failed: {0}")]
    DetectorFailed(#[from] tokio::task::JoinError),
}

/// Complete result bundle for one token analysis run. Every section is
/// always present so downstream consumers can rely on a stable shape.
#[derive(Debug, Serialize)]
pub struct TokenAnalysis {
    #[serde(flatten)]
    pub signals: RiskSignals,
    pub risk_score: u8,
    pub risk_tier: crate::core::RiskTier,
    pub risk_breakdown: RiskBreakdown,
}

pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run every detector over the transfer list and score the result.
    ///
    /// Detectors have no data dependency on each other, so they run as
    /// independent blocking tasks; the scorer waits on all five. An empty
    /// input short-circuits to an all-empty bundle with score 0 without
    /// spawning anything.
    #[instrument(skip_all, fields(transfers = transfers.len()))]
    pub async fn analyze(&self, transfers: Vec<Transfer>) -> Result<TokenAnalysis, EngineError> {
        if transfers.is_empty() {
            info!("no transfers to analyze, returning empty result bundle");
            return Ok(Self::assemble(RiskSignals {
                patterns: PatternReport::default(),
                time_anomalies: Vec::new(),
                network_metrics: NetworkAnalyzer::analyze(&[]),
                volume_analysis: VolumeReport::default(),
                address_clustering: ClusteringReport::InsufficientData {
                    error: "Not enough data for meaningful clustering".to_string(),
                },
            }));
        }

        info!("🚀 Starting pooling analysis over {} transfers", transfers.len());
        let snapshot: Arc<Vec<Transfer>> = Arc::new(transfers);

        let patterns_task = {
            let transfers = Arc::clone(&snapshot);
            let config = self.config.patterns.clone();
            tokio::task::spawn_blocking(move || PatternDetector::new(config).detect(&transfers))
        };
        let anomaly_task = {
            let transfers = Arc::clone(&snapshot);
            let config = self.config.time_anomaly.clone();
            tokio::task::spawn_blocking(move || TimeAnomalyDetector::new(config).detect(&transfers))
        };
        let network_task = {
            let transfers = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || NetworkAnalyzer::analyze(&transfers))
        };
        let volume_task = {
            let transfers = Arc::clone(&snapshot);
            let config = self.config.volume.clone();
            tokio::task::spawn_blocking(move || VolumeAnalyzer::new(config).analyze(&transfers))
        };
        let clustering_task = {
            let transfers = Arc::clone(&snapshot);
            let config = self.config.clustering.clone();
            tokio::task::spawn_blocking(move || AddressClusterer::new(config).analyze(&transfers))
        };

        // barrier: the scorer needs all five detector results
        let (patterns, time_anomalies, network_metrics, volume_analysis, address_clustering) = tokio::try_join!(
            patterns_task,
            anomaly_task,
            network_task,
            volume_task,
            clustering_task
        )?;

        let analysis = Self::assemble(RiskSignals {
            patterns,
            time_anomalies,
            network_metrics,
            volume_analysis,
            address_clustering,
        });
        info!(
            "✅ Analysis complete: risk score {}/100 ({:?})",
            analysis.risk_score, analysis.risk_tier
        );
        Ok(analysis)
    }

    fn assemble(signals: RiskSignals) -> TokenAnalysis {
        let assessment = RiskScorer::score(&signals);
        TokenAnalysis {
            signals,
            risk_score: assessment.risk_score,
            risk_tier: assessment.risk_tier,
            risk_breakdown: assessment.breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn transfer_at(from: &str, to: &str, amount: f64, minute: i64, tx: &str) -> Transfer {
        Transfer {
            sender: from.to_string(),
            receiver: to.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
            tx_hash: tx.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_input_scores_zero_with_stable_shape() {
        let engine = AnalysisEngine::new(AnalysisConfig::default());
        let analysis = engine.analyze(Vec::new()).await.unwrap();
        assert_eq!(analysis.risk_score, 0);

        let json = serde_json::to_value(&analysis).unwrap();
        for key in [
            "patterns",
            "time_anomalies",
            "network_metrics",
            "volume_analysis",
            "address_clustering",
            "risk_score",
            "risk_tier",
        ] {
            assert!(json.get(key).is_some(), "missing section {}", key);
        }
    }

    #[tokio::test]
    async fn test_wash_pattern_raises_score() {
        // circular flow plus rapid reciprocal trades between two wallets
        let mut transfers = vec![
            transfer_at("a", "b", 50.0, 0, "0x1"),
            transfer_at("b", "c", 50.0, 5, "0x2"),
            transfer_at("c", "a", 50.0, 10, "0x3"),
        ];
        for i in 0..12 {
            let (from, to) = if i % 2 == 0 { ("x", "y") } else { ("y", "x") };
            transfers.push(transfer_at(from, to, 25.0, 20 + i, &format!("0xr{}", i)));
        }
        let engine = AnalysisEngine::new(AnalysisConfig::default());
        let analysis = engine.analyze(transfers).await.unwrap();
        assert!(analysis.risk_score > 0);
        assert!(!analysis.signals.patterns.circular_trades.is_empty());
        assert!(!analysis.signals.patterns.rapid_back_forth.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_deterministic() {
        let transfers: Vec<Transfer> = (0..80)
            .map(|i| {
                transfer_at(
                    &format!("w{}", i % 15),
                    &format!("w{}", (i * 7 + 1) % 15),
                    (i % 9) as f64 + 0.5,
                    i * 3,
                    &format!("0x{}", i),
                )
            })
            .collect();
        let engine = AnalysisEngine::new(AnalysisConfig::default());
        let first = engine.analyze(transfers.clone()).await.unwrap();
        let second = engine.analyze(transfers).await.unwrap();
        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(
            first.signals.time_anomalies.len(),
            second.signals.time_anomalies.len()
        );
        assert_eq!(
            first.signals.patterns.circular_trades.len(),
            second.signals.patterns.circular_trades.len()
        );
        assert_eq!(
            serde_json::to_string(&first.signals.volume_analysis).unwrap(),
            serde_json::to_string(&second.signals.volume_analysis).unwrap()
        );
    }
}
