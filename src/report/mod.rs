/// Result documents and their persistence
///
/// One JSON document per token run, two per NFT run (movement chain and
/// behavior analysis), plus a plain-text summary. Consumers downstream
/// (report rendering, LLM summarization) rely on the stable key shape.

use crate::analysis::{ClusteringReport, NetworkAnalysis, TokenAnalysis};
use crate::core::Transfer;
use crate::nft::{BehaviorAnalysis, NftAnalysis, NftMetadata, NftToken};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct TokenReport {
    pub token_address: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub total_transfers: usize,
    pub skipped_records: usize,
    #[serde(flatten)]
    pub analysis: TokenAnalysis,
}

impl TokenReport {
    pub fn new(
        token_address: String,
        total_transfers: usize,
        skipped_records: usize,
        analysis: TokenAnalysis,
    ) -> Self {
        Self {
            token_address,
            analysis_timestamp: Utc::now(),
            total_transfers,
            skipped_records,
            analysis,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NftMovementDocument {
    pub nft_metadata: NftMetadata,
    pub movement_chain: Vec<Transfer>,
    pub total_transfers: usize,
    pub analysis_timestamp: DateTime<Utc>,
    pub contract_address: String,
    pub token_id: String,
}

#[derive(Debug, Serialize)]
pub struct NftBehaviorDocument {
    pub nft_metadata: NftMetadata,
    pub behavior_analysis: BehaviorAnalysis,
    pub analysis_timestamp: DateTime<Utc>,
    pub contract_address: String,
    pub token_id: String,
}

/// Split one NFT analysis into its two independently persistable
/// documents.
pub fn nft_documents(
    token: &NftToken,
    metadata: Option<NftMetadata>,
    analysis: NftAnalysis,
) -> (NftMovementDocument, NftBehaviorDocument) {
    let metadata = metadata.unwrap_or_default();
    let now = Utc::now();
    let movement = NftMovementDocument {
        nft_metadata: metadata.clone(),
        total_transfers: analysis.chain.len(),
        movement_chain: analysis.chain.links,
        analysis_timestamp: now,
        contract_address: token.contract_address.clone(),
        token_id: token.token_id.clone(),
    };
    let behavior = NftBehaviorDocument {
        nft_metadata: metadata,
        behavior_analysis: analysis.behavior,
        analysis_timestamp: now,
        contract_address: token.contract_address.clone(),
        token_id: token.token_id.clone(),
    };
    (movement, behavior)
}

pub struct ReportWriter {
    base_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Write the JSON results and the text summary for one token run.
    /// Returns the analysis directory.
    pub fn write_token_report(&self, report: &TokenReport) -> Result<PathBuf, ReportError> {
        let dir = self
            .base_dir
            .join("data_analysis")
            .join(format!("analysis_{}", report.token_address));
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(dir.join("pooling_analysis_results.json"), json)?;
        std::fs::write(dir.join("pooling_analysis.txt"), render_summary(report))?;

        info!("💾 Results saved in: {}", dir.display());
        Ok(dir)
    }

    /// Write both NFT documents. Returns the analysis directory.
    pub fn write_nft_documents(
        &self,
        movement: &NftMovementDocument,
        behavior: &NftBehaviorDocument,
    ) -> Result<PathBuf, ReportError> {
        let dir = self
            .base_dir
            .join("nft_data_analysis")
            .join(format!("{}_{}", movement.contract_address, movement.token_id));
        std::fs::create_dir_all(&dir)?;

        std::fs::write(
            dir.join("nft_movement_chain.json"),
            serde_json::to_string_pretty(movement)?,
        )?;
        std::fs::write(
            dir.join("behavior_analysis.json"),
            serde_json::to_string_pretty(behavior)?,
        )?;

        info!("💾 NFT results saved in: {}", dir.display());
        Ok(dir)
    }
}

/// Human-readable run summary in the shape downstream narration expects.
pub fn render_summary(report: &TokenReport) -> String {
    let signals = &report.analysis.signals;
    let mut out = String::new();

    out.push_str(&format!(
        "Pooling Analysis for Token: {}\n{}\n\n",
        report.token_address,
        "=".repeat(60)
    ));
    out.push_str(&format!(
        "Analyzed {} transfers ({} malformed records skipped)\n\n",
        report.total_transfers, report.skipped_records
    ));

    out.push_str("TRANSACTION PATTERN ANALYSIS:\n");
    out.push_str(&format!(
        "   Circular trades detected: {}\n",
        signals.patterns.circular_trades.len()
    ));
    for (length, count) in &signals.patterns.circular_trades_by_length {
        let note = match length {
            2 => "less suspicious, could be simple buy/sell",
            3 => "moderately suspicious, suggests coordination",
            _ => "highly suspicious, complex wash trading",
        };
        out.push_str(&format!("     - {}-node cycles: {} ({})\n", length, count, note));
    }
    out.push_str(&format!(
        "   Rapid back-and-forth trades: {}\n",
        signals.patterns.rapid_back_forth.len()
    ));
    out.push_str(&format!(
        "   Suspicious address pairs: {}\n",
        signals.patterns.same_address_pairs.len()
    ));
    out.push_str(&format!(
        "   Clustered amounts: {}\n\n",
        signals.patterns.amount_clustering.suspicious_amounts.len()
    ));

    out.push_str("TIME ANOMALY ANALYSIS:\n");
    out.push_str(&format!(
        "   Time anomalies detected: {}\n\n",
        signals.time_anomalies.len()
    ));

    out.push_str("NETWORK ANALYSIS:\n");
    match &signals.network_metrics {
        NetworkAnalysis::Metrics(m) => {
            out.push_str(&format!("   Nodes: {}\n", m.nodes));
            out.push_str(&format!("   Edges: {}\n", m.edges));
            out.push_str(&format!("   Communities: {}\n", m.communities));
            out.push_str(&format!(
                "   Network centralization: {:.3}\n\n",
                m.centralization_score
            ));
        }
        NetworkAnalysis::Failed { error } => {
            out.push_str(&format!("   Network analysis error: {}\n\n", error));
        }
    }

    out.push_str("VOLUME ANALYSIS:\n");
    out.push_str(&format!(
        "   Anomalous time periods: {}\n",
        signals.volume_analysis.anomalous_buckets.len()
    ));
    out.push_str(&format!(
        "   Total time periods analyzed: {}\n\n",
        signals.volume_analysis.total_time_periods
    ));

    out.push_str("ADDRESS CLUSTERING:\n");
    match &signals.address_clustering {
        ClusteringReport::Clusters(c) => {
            out.push_str(&format!(
                "   {} addresses grouped into {} behavioral clusters\n\n",
                c.addresses.len(),
                signals.address_clustering.cluster_count()
            ));
        }
        ClusteringReport::InsufficientData { error } => {
            out.push_str(&format!("   {}\n\n", error));
        }
    }

    out.push_str("RISK ASSESSMENT:\n");
    out.push_str(&format!(
        "   Overall Risk Score: {}/100\n   {:?}: {}\n",
        report.analysis.risk_score,
        report.analysis.risk_tier,
        report.analysis.risk_tier.description()
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEngine;
    use crate::config::AnalysisConfig;
    use crate::core::ZERO_ADDRESS;
    use crate::nft::NftMovementTracker;

    async fn empty_report() -> TokenReport {
        let analysis = AnalysisEngine::new(AnalysisConfig::default())
            .analyze(Vec::new())
            .await
            .unwrap();
        TokenReport::new("0xtoken".to_string(), 0, 0, analysis)
    }

    #[tokio::test]
    async fn test_token_report_shape_is_stable_for_empty_input() {
        let report = empty_report().await;
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "token_address",
            "total_transfers",
            "skipped_records",
            "patterns",
            "time_anomalies",
            "network_metrics",
            "volume_analysis",
            "address_clustering",
            "risk_score",
            "risk_tier",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(json["risk_score"], serde_json::json!(0));
    }

    #[tokio::test]
    async fn test_write_token_report_to_disk() {
        let report = empty_report().await;
        let dir = tempfile::tempdir().unwrap();
        let out = ReportWriter::new(dir.path())
            .write_token_report(&report)
            .unwrap();
        assert!(out.join("pooling_analysis_results.json").exists());
        assert!(out.join("pooling_analysis.txt").exists());
        let text = std::fs::read_to_string(out.join("pooling_analysis.txt")).unwrap();
        assert!(text.contains("Overall Risk Score: 0/100"));
    }

    #[test]
    fn test_nft_documents_written() {
        use crate::config::NftConfig;
        use chrono::TimeZone;

        let token = NftToken {
            contract_address: "0xc".to_string(),
            token_id: "1".to_string(),
        };
        let transfers = vec![Transfer {
            sender: ZERO_ADDRESS.to_string(),
            receiver: "0xa".to_string(),
            amount: 1.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tx_hash: "0x1".to_string(),
        }];
        let analysis = NftMovementTracker::new(NftConfig::default()).track(&token, &transfers);
        let (movement, behavior) = nft_documents(&token, None, analysis);

        let dir = tempfile::tempdir().unwrap();
        let out = ReportWriter::new(dir.path())
            .write_nft_documents(&movement, &behavior)
            .unwrap();
        assert!(out.join("nft_movement_chain.json").exists());
        assert!(out.join("behavior_analysis.json").exists());

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out.join("behavior_analysis.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["behavior_analysis"]["total_transfers"], 1);
        assert_eq!(json["behavior_analysis"]["unique_owners"], 1);
    }
}
