//! Ledger file reader.
//!
//! Reads the `database.json` layout written by the wallet service: a `chain`
//! of blocks, each carrying its confirmed `transactions`, plus the
//! `pendingTransactions` queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::anomaly_detection::Transaction;

/// Errors raised while reading a ledger file.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    /// The file does not exist (as opposed to being unreadable or malformed).
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ledger {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
}

/// One line of the block log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockLogEntry {
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub timestamp: String,
    pub hash: String,
    pub previous_hash: String,
}

impl std::fmt::Display for BlockLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Timestamp: {}, Hash: {}, Previous Hash: {}",
            self.timestamp, self.hash, self.previous_hash
        )
    }
}

impl Ledger {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ledger = Self::from_json(&content).map_err(|source| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = %path.display(),
            blocks = ledger.chain.len(),
            pending = ledger.pending_transactions.len(),
            "ledger loaded"
        );
        Ok(ledger)
    }

    /// Like [`Ledger::load`], but a missing or malformed file yields an empty ledger.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("{}; treating ledger as empty", e);
                Self::default()
            }
        }
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty() && self.pending_transactions.is_empty()
    }

    /// All confirmed transactions, in block order then in-block order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter().cloned())
            .collect()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn block_log(&self) -> Vec<BlockLogEntry> {
        self.chain
            .iter()
            .map(|block| BlockLogEntry {
                timestamp: format_millis(block.timestamp),
                hash: block.hash.clone(),
                previous_hash: block.previous_hash.clone(),
            })
            .collect()
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chain": [
            {
                "previousHash": "0",
                "transactions": [
                    {"fromAddress": "admin", "toAddress": "5511900000001", "amount": 100, "type": "add"}
                ],
                "timestamp": 1700000000000,
                "hash": "h1"
            },
            {
                "previousHash": "h1",
                "transactions": [
                    {"fromAddress": "5511900000001", "toAddress": "5511900000002", "amount": 25, "type": "transfer"},
                    {"fromAddress": "5511900000002", "toAddress": "5511900000003", "amount": 5, "type": "transfer"}
                ],
                "timestamp": 1700000060000,
                "hash": "h2"
            }
        ],
        "pendingTransactions": [
            {"fromAddress": "5511900000003", "toAddress": "5511900000001", "amount": 1}
        ]
    }"#;

    #[test]
    fn test_transactions_flattened_in_order() {
        let ledger = Ledger::from_json(SAMPLE).unwrap();
        let amounts: Vec<f64> = ledger.transactions().iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![100.0, 25.0, 5.0]);
        assert_eq!(ledger.pending_transactions().len(), 1);
        assert!(!ledger.is_empty());
    }

    #[test]
    fn test_block_log() {
        let ledger = Ledger::from_json(SAMPLE).unwrap();
        let log = ledger.block_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].timestamp, "2023-11-14 22:13:20");
        assert_eq!(log[1].previous_hash, "h1");
        assert_eq!(
            log[1].to_string(),
            "Timestamp: 2023-11-14 22:14:20, Hash: h2, Previous Hash: h1"
        );
    }

    #[test]
    fn test_missing_sections_default() {
        let ledger = Ledger::from_json("{}").unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.transactions().is_empty());
        assert!(ledger.block_log().is_empty());
    }
}
