use ledger_anomaly::ledger::Ledger;
use tempfile::tempdir;

const LEDGER: &str = r#"{
  "chain": [
    {
      "previousHash": "0",
      "transactions": [],
      "timestamp": 1704067200000,
      "hash": "genesis"
    },
    {
      "previousHash": "genesis",
      "transactions": [
        {"fromAddress": "5511900000000", "toAddress": "5511911111111", "amount": 50, "type": "add", "timestamp": "2024-01-01T00:01:00.000Z", "hash": "t1"},
        {"fromAddress": "5511911111111", "toAddress": "5511922222222", "amount": 20, "type": "transfer", "timestamp": "2024-01-01T00:02:00.000Z", "hash": "t2"}
      ],
      "timestamp": 1704067320000,
      "hash": "b1"
    }
  ],
  "pendingTransactions": []
}"#;

#[test]
fn test_load_ledger_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("database.json");
    std::fs::write(&path, LEDGER).unwrap();

    let ledger = Ledger::load(&path).unwrap();
    let txs = ledger.transactions();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].to_address, "5511911111111");
    assert_eq!(txs[1].hash.as_deref(), Some("t2"));
    assert!(ledger.pending_transactions().is_empty());

    let log = ledger.block_log();
    assert_eq!(log[0].timestamp, "2024-01-01 00:00:00");
    assert_eq!(log[1].hash, "b1");
}

#[test]
fn test_missing_ledger() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = Ledger::load(&path).unwrap_err();
    assert!(err.is_not_found());
    assert!(Ledger::load_or_empty(&path).is_empty());
}

#[test]
fn test_malformed_ledger_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("database.json");
    std::fs::write(&path, "{\"chain\": [").unwrap();

    let err = Ledger::load(&path).unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("failed to parse ledger"));
    assert!(Ledger::load_or_empty(&path).is_empty());
}
