/// NFT movement tracking: ownership chain reconstruction plus the
/// behavior analysis built on top of it.

pub mod behavior;
pub mod chain;

pub use behavior::{BehaviorAnalysis, NftBehaviorAnalyzer, Severity};
pub use chain::{HopTiming, MovementChain};

use crate::config::NftConfig;
use crate::core::Transfer;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Identity of one non-fungible token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftToken {
    pub contract_address: String,
    pub token_id: String,
}

/// Token metadata carried through from the indexer's `token_instance`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NftMetadata {
    pub token_name: String,
    pub token_symbol: String,
    pub parsed_metadata: serde_json::Value,
}

/// Movement chain and behavior analysis for one token.
#[derive(Debug, Serialize)]
pub struct NftAnalysis {
    pub chain: MovementChain,
    pub behavior: BehaviorAnalysis,
}

pub struct NftMovementTracker {
    config: NftConfig,
}

impl NftMovementTracker {
    pub fn new(config: NftConfig) -> Self {
        Self { config }
    }

    /// Reconstruct the ownership chain for one (contract, token) pair and
    /// run the behavior pass over it. A transfer set without a mint yields
    /// an empty chain and a zeroed analysis.
    pub fn track(&self, token: &NftToken, transfers: &[Transfer]) -> NftAnalysis {
        info!(
            "🔍 Tracking NFT {} #{} across {} transfers",
            token.contract_address,
            token.token_id,
            transfers.len()
        );
        let chain = MovementChain::reconstruct(transfers);
        let behavior = NftBehaviorAnalyzer::new(self.config.clone()).analyze(&chain);
        NftAnalysis { chain, behavior }
    }
}
