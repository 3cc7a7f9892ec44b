//! transaction特征提取器
//!
//! from账本transaction中提取用于异常检测的特征（目前只有金额一维）

use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};

/// 账本中的一笔转账
///
/// 评分引擎只读取 `from_address`、`to_address` 和 `amount`，其余字段仅用于展示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    pub amount: f64,
    /// "add" 表示充值，"transfer" 表示转账
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Transaction {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: f64) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            kind: None,
            timestamp: None,
            hash: None,
        }
    }
}

/// 特征向量：ℝⁿ 中的一个点
pub type FeatureVector = Vec<f64>;

/// 特征提取器
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 每笔transaction一个 `[amount]` 向量，保持输入顺序
    pub fn extract(&self, transactions: &[Transaction]) -> Result<Vec<FeatureVector>> {
        transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                Self::validate_amount(tx.amount)
                    .map_err(|e| AnomalyDetectionError::invalid(format!("transaction #{}: {}", i, e)))?;
                Ok(vec![tx.amount])
            })
            .collect()
    }

    /// 特征维度
    pub fn dimension(&self) -> usize {
        1
    }

    fn validate_amount(amount: f64) -> std::result::Result<(), String> {
        if !amount.is_finite() {
            return Err(format!("amount must be finite, got {}", amount));
        }
        if amount < 0.0 {
            return Err(format!("amount must be non-negative, got {}", amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_extraction_keeps_order() {
        let txs = vec![
            Transaction::new("A", "B", 10.0),
            Transaction::new("A", "C", 0.0),
            Transaction::new("B", "C", 12.5),
        ];
        let features = FeatureExtractor::new().extract(&txs).unwrap();
        assert_eq!(features, vec![vec![10.0], vec![0.0], vec![12.5]]);
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let txs = vec![Transaction::new("A", "B", 1.0), Transaction::new("A", "B", bad)];
            let err = FeatureExtractor::new().extract(&txs).unwrap_err();
            assert!(matches!(err, AnomalyDetectionError::InvalidArgument(_)));
            assert!(err.to_string().contains("transaction #1"));
        }
    }

    #[test]
    fn test_negative_amount_rejected() {
        let txs = vec![Transaction::new("A", "B", -5.0)];
        assert!(FeatureExtractor::new().extract(&txs).is_err());
    }

    #[test]
    fn test_transaction_deserializes_ledger_fields() {
        let raw = r#"{
            "fromAddress": "5511999990000",
            "toAddress": "5511988880000",
            "amount": 42,
            "type": "transfer",
            "timestamp": "2024-05-01T12:00:00.000Z",
            "hash": "abc123"
        }"#;
        let tx: Transaction = serde_json::from_str(raw).unwrap();
        assert_eq!(tx.from_address, "5511999990000");
        assert_eq!(tx.amount, 42.0);
        assert_eq!(tx.kind.as_deref(), Some("transfer"));
    }
}
