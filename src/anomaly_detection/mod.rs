//! 账本异常检测模块
//!
//! 无监督孤立森林评分：不需要已标注的欺诈样本，按金额把批次中的可疑转账挑出来。
//!
//! ## 特性
//! - 🌲 从零实现的孤立森林（随机划分树 + 路径长度评分）
//! - 🎯 按 contamination 比例给出 `-1` / `1` 判定
//! - 📋 可直接展示的报告行（from / to / amount / reason）
//! - 🔁 固定种子时完全可复现

pub mod config;
pub mod detector;
pub mod errors;
pub mod features;
pub mod model;
pub mod report;

pub use config::DetectionConfig;
pub use detector::{AnomalyDetector, ScanOutcome, ScanReport, NO_TRANSACTIONS_NOTICE};
pub use errors::{AnomalyDetectionError, Result};
pub use features::{FeatureExtractor, FeatureVector, Transaction};
pub use model::{IsolationForest, IsolationTree, Prediction};
pub use report::{build_report, ReportRow};

/// 单笔transaction的判定，派生数据，不回写到transaction上
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyVerdict {
    /// 是否检测到异常
    pub is_anomaly: bool,
    /// 异常分数 (0.0-1.0]
    pub score: f64,
    /// 详细原因
    pub reason: String,
}

impl AnomalyVerdict {
    /// 创建正常结果
    pub fn normal(score: f64) -> Self {
        Self {
            is_anomaly: false,
            score,
            reason: report::NORMAL_REASON.to_string(),
        }
    }

    /// 创建异常结果
    pub fn anomalous(score: f64) -> Self {
        Self {
            is_anomaly: true,
            score,
            reason: report::SUSPICIOUS_REASON.to_string(),
        }
    }
}
