/// NFT ownership chain reconstruction
///
/// A non-fungible unit has exactly one owner at any time, so one linear
/// chain exists per token: it starts at the mint (zero-address sender)
/// and every link's sender equals the previous link's receiver.

use crate::core::Transfer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The reconstructed ownership trail. Empty when no mint transfer exists
/// in the input; downstream analysis treats that as missing data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MovementChain {
    pub links: Vec<Transfer>,
}

/// Time elapsed between two consecutive chain links.
#[derive(Debug, Clone, Serialize)]
pub struct HopTiming {
    pub from_transfer: usize,
    pub to_transfer: usize,
    pub time_diff_seconds: f64,
    pub time_diff_hours: f64,
    pub time_diff_days: f64,
    pub from_address: String,
    pub to_address: String,
    pub timestamp_previous: DateTime<Utc>,
    pub timestamp_current: DateTime<Utc>,
}

impl MovementChain {
    /// Rebuild the chain from an unordered transfer set.
    ///
    /// Transfers are sorted by timestamp; the walk starts at the mint and
    /// repeatedly appends the earliest not-yet-included transfer whose
    /// sender equals the current owner.
    pub fn reconstruct(transfers: &[Transfer]) -> Self {
        if transfers.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<&Transfer> = transfers.iter().collect();
        sorted.sort_by_key(|t| t.timestamp);

        let mint_position = match sorted.iter().position(|t| t.is_mint()) {
            Some(position) => position,
            None => {
                info!("No mint transaction found (from zero address)");
                return Self::default();
            }
        };

        let mut used = vec![false; sorted.len()];
        used[mint_position] = true;
        let mut links = vec![sorted[mint_position].clone()];
        let mut current_owner = sorted[mint_position].receiver.clone();

        // ties among candidate successors resolve to the earliest
        // timestamp because `sorted` is scanned front to back
        loop {
            let next = sorted
                .iter()
                .enumerate()
                .find(|(i, t)| !used[*i] && t.sender == current_owner);
            match next {
                Some((i, transfer)) => {
                    used[i] = true;
                    current_owner = transfer.receiver.clone();
                    links.push((*transfer).clone());
                }
                None => break,
            }
        }

        debug!("movement chain built with {} transfers", links.len());
        Self { links }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Address holding the token after the last chain link.
    pub fn current_owner(&self) -> Option<&str> {
        self.links.last().map(|t| t.receiver.as_str())
    }

    pub fn unique_owners(&self) -> usize {
        self.links
            .iter()
            .map(|t| t.receiver.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Per-hop time differences between consecutive chain entries.
    pub fn hop_timings(&self) -> Vec<HopTiming> {
        self.links
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let seconds = (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64;
                HopTiming {
                    from_transfer: i,
                    to_transfer: i + 1,
                    time_diff_seconds: seconds,
                    time_diff_hours: seconds / 3600.0,
                    time_diff_days: seconds / 86400.0,
                    from_address: pair[0].receiver.clone(),
                    to_address: pair[1].receiver.clone(),
                    timestamp_previous: pair[0].timestamp,
                    timestamp_current: pair[1].timestamp,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ZERO_ADDRESS;
    use chrono::{Duration, TimeZone};

    fn transfer_at(from: &str, to: &str, hour: i64, tx: &str) -> Transfer {
        Transfer {
            sender: from.to_string(),
            receiver: to.to_string(),
            amount: 1.0,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            tx_hash: tx.to_string(),
        }
    }

    #[test]
    fn test_chain_rebuilt_from_shuffled_input() {
        // input order deliberately scrambled
        let transfers = vec![
            transfer_at("y", "z", 48, "0x4"),
            transfer_at(ZERO_ADDRESS, "x", 0, "0x1"),
            transfer_at("x", "y", 24, "0x2"),
        ];
        let chain = MovementChain::reconstruct(&transfers);
        assert_eq!(chain.len(), 3);
        let hashes: Vec<&str> = chain.links.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x2", "0x4"]);
        assert_eq!(chain.unique_owners(), 3);
        assert_eq!(chain.current_owner(), Some("z"));
    }

    #[test]
    fn test_no_mint_means_empty_chain() {
        let transfers = vec![transfer_at("a", "b", 0, "0x1"), transfer_at("b", "c", 1, "0x2")];
        let chain = MovementChain::reconstruct(&transfers);
        assert!(chain.is_empty());
        assert_eq!(chain.unique_owners(), 0);
        assert!(chain.hop_timings().is_empty());
    }

    #[test]
    fn test_successor_tie_breaks_on_earliest_timestamp() {
        // x sends twice; the earlier transfer must be chosen first
        let transfers = vec![
            transfer_at(ZERO_ADDRESS, "x", 0, "0xmint"),
            transfer_at("x", "late", 30, "0xlate"),
            transfer_at("x", "early", 10, "0xearly"),
            transfer_at("early", "x", 20, "0xback"),
        ];
        let chain = MovementChain::reconstruct(&transfers);
        let hashes: Vec<&str> = chain.links.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xmint", "0xearly", "0xback", "0xlate"]);
    }

    #[test]
    fn test_hop_timings() {
        let transfers = vec![
            transfer_at(ZERO_ADDRESS, "x", 0, "0x1"),
            transfer_at("x", "y", 36, "0x2"),
        ];
        let chain = MovementChain::reconstruct(&transfers);
        let hops = chain.hop_timings();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].time_diff_hours, 36.0);
        assert_eq!(hops[0].time_diff_days, 1.5);
        assert_eq!(hops[0].from_address, "x");
        assert_eq!(hops[0].to_address, "y");
    }
}
