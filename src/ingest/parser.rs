/// Validation of raw indexer records into canonical transfers
///
/// The upstream indexer emits loosely-typed records; validation happens
/// once here, so every detector downstream works on a strict type. A
/// malformed record is a hard local failure for that record only.

use crate::core::Transfer;
use crate::nft::NftMetadata;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawParty {
    pub address_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenInstance {
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_metadata: Option<String>,
}

/// One record as fetched. Every field is optional; validation decides
/// what is fatal for the record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransferRecord {
    pub from: Option<RawParty>,
    pub to: Option<RawParty>,
    pub amount: Option<serde_json::Value>,
    pub timestamp: Option<String>,
    pub tx_hash: Option<String>,
    pub token_instance: Option<RawTokenInstance>,
}

/// How record-level failures are handled. `SkipAndCount` is the default
/// for unattended runs over noisy real-world feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePolicy {
    FailFast,
    SkipAndCount,
}

#[derive(Debug, Default)]
pub struct ParsedTransfers {
    pub transfers: Vec<Transfer>,
    pub skipped: usize,
}

pub struct TransferParser {
    policy: ParsePolicy,
}

impl TransferParser {
    pub fn new(policy: ParsePolicy) -> Self {
        Self { policy }
    }

    pub fn parse(&self, records: &[RawTransferRecord]) -> Result<ParsedTransfers, IngestError> {
        let mut parsed = ParsedTransfers::default();
        for (index, record) in records.iter().enumerate() {
            match parse_record(record) {
                Ok(transfer) => parsed.transfers.push(transfer),
                Err(error) => match self.policy {
                    ParsePolicy::FailFast => return Err(error),
                    ParsePolicy::SkipAndCount => {
                        warn!("skipping record {}: {}", index, error);
                        parsed.skipped += 1;
                    }
                },
            }
        }
        debug!(
            "parsed {} transfers, skipped {}",
            parsed.transfers.len(),
            parsed.skipped
        );
        Ok(parsed)
    }
}

pub fn parse_record(record: &RawTransferRecord) -> Result<Transfer, IngestError> {
    let sender = record
        .from
        .as_ref()
        .and_then(|p| p.address_hash.clone())
        .ok_or(IngestError::MissingField("from.address_hash"))?;
    let receiver = record
        .to
        .as_ref()
        .and_then(|p| p.address_hash.clone())
        .ok_or(IngestError::MissingField("to.address_hash"))?;
    let tx_hash = record
        .tx_hash
        .clone()
        .ok_or(IngestError::MissingField("tx_hash"))?;

    let amount = parse_amount(
        record
            .amount
            .as_ref()
            .ok_or(IngestError::MissingField("amount"))?,
    )?;
    let timestamp = parse_timestamp(
        record
            .timestamp
            .as_deref()
            .ok_or(IngestError::MissingField("timestamp"))?,
    )?;

    Ok(Transfer {
        sender,
        receiver,
        amount,
        timestamp,
        tx_hash,
    })
}

fn parse_amount(value: &serde_json::Value) -> Result<f64, IngestError> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| IngestError::InvalidAmount(value.to_string()))?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(IngestError::InvalidAmount(value.to_string()));
    }
    Ok(amount)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| IngestError::InvalidTimestamp(raw.to_string()))
}

/// Token metadata from the first record carrying a `token_instance`.
/// Unparseable metadata JSON is kept verbatim under `raw_metadata`.
pub fn extract_nft_metadata(records: &[RawTransferRecord]) -> Option<NftMetadata> {
    let instance = records.iter().find_map(|r| r.token_instance.as_ref())?;
    let raw = instance.token_metadata.as_deref().unwrap_or("{}");
    let parsed_metadata = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::json!({ "raw_metadata": raw }));
    Some(NftMetadata {
        token_name: instance.token_name.clone().unwrap_or_default(),
        token_symbol: instance.token_symbol.clone().unwrap_or_default(),
        parsed_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: serde_json::Value) -> RawTransferRecord {
        serde_json::from_value(json).unwrap()
    }

    fn valid_record() -> serde_json::Value {
        serde_json::json!({
            "from": { "address_hash": "0xaaa" },
            "to": { "address_hash": "0xbbb" },
            "amount": "12.5",
            "timestamp": "2024-01-05T10:30:00.000000Z",
            "tx_hash": "0x123"
        })
    }

    #[test]
    fn test_valid_record_parses() {
        let transfer = parse_record(&raw(valid_record())).unwrap();
        assert_eq!(transfer.sender, "0xaaa");
        assert_eq!(transfer.receiver, "0xbbb");
        assert_eq!(transfer.amount, 12.5);
        assert_eq!(transfer.tx_hash, "0x123");
    }

    #[test]
    fn test_numeric_amount_accepted() {
        let mut record = valid_record();
        record["amount"] = serde_json::json!(3.25);
        assert_eq!(parse_record(&raw(record)).unwrap().amount, 3.25);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut record = valid_record();
        record["amount"] = serde_json::json!("-1.0");
        assert!(matches!(
            parse_record(&raw(record)),
            Err(IngestError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_skip_and_count() {
        let mut bad = valid_record();
        bad["timestamp"] = serde_json::json!("not-a-time");
        let records = vec![raw(valid_record()), raw(bad)];

        let parsed = TransferParser::new(ParsePolicy::SkipAndCount)
            .parse(&records)
            .unwrap();
        assert_eq!(parsed.transfers.len(), 1);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_bad_timestamp_fail_fast() {
        let mut bad = valid_record();
        bad["timestamp"] = serde_json::json!("not-a-time");
        let records = vec![raw(valid_record()), raw(bad)];

        let result = TransferParser::new(ParsePolicy::FailFast).parse(&records);
        assert!(matches!(result, Err(IngestError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_missing_party_rejected() {
        let mut record = valid_record();
        record.as_object_mut().unwrap().remove("from");
        assert!(matches!(
            parse_record(&raw(record)),
            Err(IngestError::MissingField("from.address_hash"))
        ));
    }

    #[test]
    fn test_metadata_extraction_with_broken_json() {
        let mut record = valid_record();
        record["token_instance"] = serde_json::json!({
            "token_name": "Punk",
            "token_symbol": "PNK",
            "token_metadata": "{not json"
        });
        let metadata = extract_nft_metadata(&[raw(record)]).unwrap();
        assert_eq!(metadata.token_name, "Punk");
        assert_eq!(metadata.token_symbol, "PNK");
        assert_eq!(
            metadata.parsed_metadata["raw_metadata"],
            serde_json::json!("{not json")
        );
    }
}
