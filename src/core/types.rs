/// Canonical transfer records shared by every detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel sender for mint transfers ("no prior owner").
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// One validated token or NFT transfer. Immutable once ingested.
///
/// Transfer lists are ordered by arrival index as fetched, not guaranteed
/// chronological; components that need chronological order sort explicitly
/// by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
}

impl Transfer {
    /// Whether this transfer originates from the zero-address sentinel.
    pub fn is_mint(&self) -> bool {
        self.sender == ZERO_ADDRESS
    }
}

/// Per-address aggregate built from a transfer list. Feature basis for
/// behavioral clustering.
#[derive(Debug, Clone, Serialize)]
pub struct AddressProfile {
    pub sent: f64,
    pub received: f64,
    pub count_sent: u64,
    pub count_received: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip)]
    pub counterparties: BTreeSet<String>,
}

impl AddressProfile {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            sent: 0.0,
            received: 0.0,
            count_sent: 0,
            count_received: 0,
            first_seen: timestamp,
            last_seen: timestamp,
            counterparties: BTreeSet::new(),
        }
    }

    pub fn record_sent(&mut self, amount: f64, counterparty: &str, timestamp: DateTime<Utc>) {
        self.sent += amount;
        self.count_sent += 1;
        self.touch(timestamp);
        self.counterparties.insert(counterparty.to_string());
    }

    pub fn record_received(&mut self, amount: f64, counterparty: &str, timestamp: DateTime<Utc>) {
        self.received += amount;
        self.count_received += 1;
        self.touch(timestamp);
        self.counterparties.insert(counterparty.to_string());
    }

    fn touch(&mut self, timestamp: DateTime<Utc>) {
        if timestamp < self.first_seen {
            self.first_seen = timestamp;
        }
        if timestamp > self.last_seen {
            self.last_seen = timestamp;
        }
    }

    /// Active duration in hours between first and last observation.
    pub fn active_hours(&self) -> f64 {
        (self.last_seen - self.first_seen).num_seconds() as f64 / 3600.0
    }

    pub fn total_count(&self) -> u64 {
        self.count_sent + self.count_received
    }
}

/// Risk tier bands for reporting. Boundaries use the strictly-greater
/// convention: > 75 High, > 50 Medium, > 25 LowMedium, otherwise Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    High,
    Medium,
    LowMedium,
    Low,
}

impl RiskTier {
    pub fn from_score(score: u8) -> Self {
        if score > 75 {
            RiskTier::High
        } else if score > 50 {
            RiskTier::Medium
        } else if score > 25 {
            RiskTier::LowMedium
        } else {
            RiskTier::Low
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskTier::High => "Strong evidence of artificial pooling/wash trading",
            RiskTier::Medium => "Several suspicious patterns detected",
            RiskTier::LowMedium => "Some unusual patterns detected",
            RiskTier::Low => "Normal trading patterns detected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mint_detection() {
        let transfer = Transfer {
            sender: ZERO_ADDRESS.to_string(),
            receiver: "0xabc".to_string(),
            amount: 1.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tx_hash: "0x01".to_string(),
        };
        assert!(transfer.is_mint());
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_score(76), RiskTier::High);
        assert_eq!(RiskTier::from_score(75), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(51), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(50), RiskTier::LowMedium);
        assert_eq!(RiskTier::from_score(26), RiskTier::LowMedium);
        assert_eq!(RiskTier::from_score(25), RiskTier::Low);
        assert_eq!(RiskTier::from_score(0), RiskTier::Low);
    }

    #[test]
    fn test_profile_window() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut profile = AddressProfile::new(t1);
        profile.record_sent(5.0, "0xdef", t0);
        profile.record_received(2.0, "0xghi", t1);
        assert_eq!(profile.first_seen, t0);
        assert_eq!(profile.last_seen, t1);
        assert_eq!(profile.active_hours(), 12.0);
        assert_eq!(profile.counterparties.len(), 2);
        assert_eq!(profile.total_count(), 2);
    }
}
