/// Ingestion of pre-fetched transfer documents

pub mod parser;

pub use parser::{
    extract_nft_metadata, parse_record, IngestError, ParsePolicy, ParsedTransfers, RawParty,
    RawTokenInstance, RawTransferRecord, TransferParser,
};

use serde::Deserialize;
use std::path::Path;

/// Root shape of a fetched transfer document.
#[derive(Debug, Deserialize)]
pub struct TransferDocument {
    #[serde(default)]
    pub transfers: Vec<RawTransferRecord>,
}

/// Load a transfer document produced by the fetch layer.
pub fn load_transfer_document(path: &Path) -> anyhow::Result<TransferDocument> {
    let content = std::fs::read_to_string(path)?;
    let document = serde_json::from_str(&content)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transfers.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"transfers": [{{"from": {{"address_hash": "0xa"}}, "to": {{"address_hash": "0xb"}}, "amount": "1", "timestamp": "2024-01-01T00:00:00Z", "tx_hash": "0x1"}}]}}"#
        )
        .unwrap();

        let document = load_transfer_document(&path).unwrap();
        assert_eq!(document.transfers.len(), 1);
        let parsed = TransferParser::new(ParsePolicy::SkipAndCount)
            .parse(&document.transfers)
            .unwrap();
        assert_eq!(parsed.transfers.len(), 1);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_document_without_transfers_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "{}").unwrap();
        let document = load_transfer_document(&path).unwrap();
        assert!(document.transfers.is_empty());
    }
}
