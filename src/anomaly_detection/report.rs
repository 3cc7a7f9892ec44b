//! 异常报告生成
//!
//! 把transaction与模型判定合并成可展示的行，纯函数，无副作用

use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};
use super::features::Transaction;
use super::model::Prediction;

pub const SUSPICIOUS_REASON: &str = "Transaction suspicious due to high value.";
pub const NORMAL_REASON: &str = "Normal transaction";

/// 报告中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub reason: String,
}

/// 判定对应的说明文字
pub fn reason_for(prediction: Prediction) -> &'static str {
    match prediction {
        Prediction::Anomaly => SUSPICIOUS_REASON,
        Prediction::Normal => NORMAL_REASON,
    }
}

/// 按输入顺序逐对生成报告行
pub fn build_report(transactions: &[Transaction], predictions: &[Prediction]) -> Result<Vec<ReportRow>> {
    if transactions.len() != predictions.len() {
        return Err(AnomalyDetectionError::LengthMismatch {
            transactions: transactions.len(),
            predictions: predictions.len(),
        });
    }

    Ok(transactions
        .iter()
        .zip(predictions)
        .map(|(tx, prediction)| ReportRow {
            from: tx.from_address.clone(),
            to: tx.to_address.clone(),
            amount: tx.amount,
            reason: reason_for(*prediction).to_string(),
        })
        .collect())
}
