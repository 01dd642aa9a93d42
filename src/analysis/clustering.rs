/// Behavioral clustering of addresses
///
/// Exploratory grouping of behavior archetypes (high-frequency traders,
/// passive holders, pass-throughs) from per-address aggregates. Not a
/// labeled classification.

use crate::config::ClusteringConfig;
use crate::core::{AddressProfile, Transfer};
use crate::ml::{KMeans, StandardScaler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub sent: f64,
    pub received: f64,
    pub count_sent: u64,
    pub count_received: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub unique_counterparties_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressClusters {
    pub addresses: Vec<String>,
    pub clusters: Vec<usize>,
    pub cluster_centers: Vec<Vec<f64>>,
    pub address_stats: BTreeMap<String, ProfileSummary>,
}

/// Clustering needs enough distinct addresses to be meaningful; below the
/// threshold an explicit marker replaces the result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClusteringReport {
    Clusters(AddressClusters),
    InsufficientData { error: String },
}

impl ClusteringReport {
    pub fn cluster_count(&self) -> usize {
        match self {
            ClusteringReport::Clusters(c) => {
                c.clusters.iter().copied().max().map_or(0, |m| m + 1)
            }
            ClusteringReport::InsufficientData { .. } => 0,
        }
    }
}

pub struct AddressClusterer {
    config: ClusteringConfig,
}

impl AddressClusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, transfers: &[Transfer]) -> ClusteringReport {
        let profiles = build_profiles(transfers);
        info!("👥 Clustering behavior of {} addresses", profiles.len());

        if profiles.len() <= self.config.min_addresses {
            return ClusteringReport::InsufficientData {
                error: "Not enough data for meaningful clustering".to_string(),
            };
        }

        let addresses: Vec<String> = profiles.keys().cloned().collect();
        let features: Vec<Vec<f64>> = addresses
            .iter()
            .map(|addr| feature_vector(&profiles[addr]))
            .collect();
        let scaled = StandardScaler::fit_transform(&features);

        let k = (addresses.len() / self.config.addresses_per_cluster)
            .max(self.config.min_clusters)
            .min(self.config.max_clusters);
        let fit = KMeans::new(k, self.config.seed).fit(&scaled);

        ClusteringReport::Clusters(AddressClusters {
            address_stats: profiles
                .iter()
                .map(|(addr, p)| {
                    (
                        addr.clone(),
                        ProfileSummary {
                            sent: p.sent,
                            received: p.received,
                            count_sent: p.count_sent,
                            count_received: p.count_received,
                            first_seen: p.first_seen,
                            last_seen: p.last_seen,
                            unique_counterparties_count: p.counterparties.len(),
                        },
                    )
                })
                .collect(),
            addresses,
            clusters: fit.labels,
            cluster_centers: fit.centroids,
        })
    }
}

pub fn build_profiles(transfers: &[Transfer]) -> BTreeMap<String, AddressProfile> {
    let mut profiles: BTreeMap<String, AddressProfile> = BTreeMap::new();
    for transfer in transfers {
        profiles
            .entry(transfer.sender.clone())
            .or_insert_with(|| AddressProfile::new(transfer.timestamp))
            .record_sent(transfer.amount, &transfer.receiver, transfer.timestamp);
        profiles
            .entry(transfer.receiver.clone())
            .or_insert_with(|| AddressProfile::new(transfer.timestamp))
            .record_received(transfer.amount, &transfer.sender, transfer.timestamp);
    }
    profiles
}

/// Nine behavioral features per address. Ratio and rate denominators floor
/// at 1 so inactive or instantaneous addresses stay finite.
fn feature_vector(profile: &AddressProfile) -> Vec<f64> {
    let duration = profile.active_hours();
    vec![
        profile.sent,
        profile.received,
        profile.count_sent as f64,
        profile.count_received as f64,
        profile.sent / profile.received.max(1.0),
        profile.received / profile.sent.max(1.0),
        profile.counterparties.len() as f64,
        duration,
        profile.total_count() as f64 / duration.max(1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn transfer_at(from: &str, to: &str, amount: f64, minute: i64) -> Transfer {
        Transfer {
            sender: from.to_string(),
            receiver: to.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
            tx_hash: format!("0x{}-{}-{}", from, to, minute),
        }
    }

    #[test]
    fn test_insufficient_addresses() {
        let transfers = vec![transfer_at("a", "b", 1.0, 0), transfer_at("b", "c", 1.0, 5)];
        let report = AddressClusterer::new(ClusteringConfig::default()).analyze(&transfers);
        assert!(matches!(report, ClusteringReport::InsufficientData { .. }));
        assert_eq!(report.cluster_count(), 0);
    }

    #[test]
    fn test_clusters_cover_all_addresses() {
        let mut transfers = Vec::new();
        // 6 whales moving large volume fast, 6 holders receiving once
        for i in 0..6 {
            for round in 0..10 {
                transfers.push(transfer_at(
                    &format!("whale{}", i),
                    &format!("whale{}", (i + 1) % 6),
                    1000.0,
                    round,
                ));
            }
        }
        for i in 0..6 {
            transfers.push(transfer_at("whale0", &format!("holder{}", i), 1.0, 600 + i));
        }
        let report = AddressClusterer::new(ClusteringConfig::default()).analyze(&transfers);
        match report {
            ClusteringReport::Clusters(c) => {
                assert_eq!(c.addresses.len(), 12);
                assert_eq!(c.clusters.len(), 12);
                assert!(!c.cluster_centers.is_empty());
                assert_eq!(c.address_stats.len(), 12);
                // feature vectors are 9-dimensional
                assert_eq!(c.cluster_centers[0].len(), 9);
            }
            ClusteringReport::InsufficientData { .. } => panic!("expected clusters"),
        }
    }

    #[test]
    fn test_profiles_aggregate_both_sides() {
        let transfers = vec![
            transfer_at("a", "b", 5.0, 0),
            transfer_at("b", "a", 3.0, 30),
            transfer_at("a", "c", 2.0, 60),
        ];
        let profiles = build_profiles(&transfers);
        let a = &profiles["a"];
        assert_eq!(a.sent, 7.0);
        assert_eq!(a.received, 3.0);
        assert_eq!(a.count_sent, 2);
        assert_eq!(a.count_received, 1);
        assert_eq!(a.counterparties.len(), 2);
        assert_eq!(a.active_hours(), 1.0);
    }

    #[test]
    fn test_deterministic_labels() {
        let transfers: Vec<Transfer> = (0..30)
            .map(|i| {
                transfer_at(
                    &format!("w{}", i % 12),
                    &format!("w{}", (i + 1) % 12),
                    (i % 5) as f64 + 1.0,
                    i,
                )
            })
            .collect();
        let clusterer = AddressClusterer::new(ClusteringConfig::default());
        let a = clusterer.analyze(&transfers);
        let b = clusterer.analyze(&transfers);
        match (a, b) {
            (ClusteringReport::Clusters(x), ClusteringReport::Clusters(y)) => {
                assert_eq!(x.clusters, y.clusters);
            }
            _ => panic!("expected clusters on both runs"),
        }
    }
}
