//! 异常检测器 - 主入口
//!
//! 配置 → 特征提取 → 训练森林 → 判定 → 报告。空批次直接返回提示，不进入评分。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::config::{validate_contamination, DetectionConfig};
use super::errors::Result;
use super::features::{FeatureExtractor, Transaction};
use super::model::{label_by_contamination, IsolationForest};
use super::report::{build_report, ReportRow};
use super::AnomalyVerdict;

pub const NO_TRANSACTIONS_NOTICE: &str = "No transactions available to check for fraud.";

/// 一次扫描的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// 批次为空，未执行评分
    NoTransactions,
    Scored(ScanReport),
}

impl ScanOutcome {
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Scored(report) => Some(report),
            ScanOutcome::NoTransactions => None,
        }
    }

    pub fn into_report(self) -> Option<ScanReport> {
        match self {
            ScanOutcome::Scored(report) => Some(report),
            ScanOutcome::NoTransactions => None,
        }
    }
}

/// 扫描报告：报告行与逐笔判定一一对应，顺序同输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub rows: Vec<ReportRow>,
    pub verdicts: Vec<AnomalyVerdict>,
    pub num_trees: usize,
    pub subsample_size: usize,
    pub contamination: f64,
    pub duration_ms: u64,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_anomaly).count()
    }

    /// 被标记为可疑的行
    pub fn anomalies(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows
            .iter()
            .zip(&self.verdicts)
            .filter(|(_, verdict)| verdict.is_anomaly)
            .map(|(row, _)| row)
    }
}

/// 异常检测器
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: DetectionConfig,
    feature_extractor: FeatureExtractor,
}

impl AnomalyDetector {
    /// 创建新的检测器（带配置）
    pub fn with_config(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            feature_extractor: FeatureExtractor::new(),
        })
    }

    /// 创建新的检测器（使用默认配置）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn set_contamination(&mut self, contamination: f64) -> Result<()> {
        validate_contamination(contamination)?;
        self.config.contamination = contamination;
        info!("🔧 contamination set to {:.3}", contamination);
        Ok(())
    }

    /// 扫描一批transaction；配置里有种子时结果可复现
    pub fn scan(&self, transactions: &[Transaction]) -> Result<ScanOutcome> {
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.scan_with_rng(transactions, &mut rng)
    }

    /// 使用调用方提供的随机源扫描
    pub fn scan_with_rng<R: Rng + ?Sized>(
        &self,
        transactions: &[Transaction],
        rng: &mut R,
    ) -> Result<ScanOutcome> {
        if transactions.is_empty() {
            info!("{}", NO_TRANSACTIONS_NOTICE);
            return Ok(ScanOutcome::NoTransactions);
        }
        self.config.validate()?;

        let start_time = Instant::now();
        info!("🔍 scanning {} transactions for anomalies", transactions.len());

        let features = self.feature_extractor.extract(transactions)?;
        let subsample_size = self.config.effective_subsample_size(features.len());
        debug!(
            num_trees = self.config.num_trees,
            subsample_size,
            contamination = self.config.contamination,
            seeded = self.config.random_seed.is_some(),
            "detector parameters"
        );

        let forest = IsolationForest::fit(&features, self.config.num_trees, subsample_size, rng)?;
        let scores = forest.score_samples(&features)?;
        let predictions = label_by_contamination(&scores, self.config.contamination);
        let rows = build_report(transactions, &predictions)?;

        let verdicts: Vec<AnomalyVerdict> = predictions
            .iter()
            .zip(&scores)
            .map(|(prediction, score)| {
                if prediction.is_anomaly() {
                    AnomalyVerdict::anomalous(*score)
                } else {
                    AnomalyVerdict::normal(*score)
                }
            })
            .collect();

        for (row, verdict) in rows.iter().zip(&verdicts) {
            if verdict.is_anomaly {
                warn!(
                    from = %row.from,
                    to = %row.to,
                    amount = row.amount,
                    score = verdict.score,
                    "⚠️ suspicious transaction"
                );
            }
        }

        let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = ScanReport {
            rows,
            verdicts,
            num_trees: forest.num_trees(),
            subsample_size: forest.subsample_size(),
            contamination: self.config.contamination,
            duration_ms,
        };
        info!(
            "✅ scan complete: {} of {} flagged in {}ms",
            report.anomaly_count(),
            report.len(),
            duration_ms
        );
        Ok(ScanOutcome::Scored(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly_detection::report::{NORMAL_REASON, SUSPICIOUS_REASON};

    fn seeded_detector(seed: u64, contamination: f64) -> AnomalyDetector {
        AnomalyDetector::with_config(DetectionConfig {
            contamination,
            random_seed: Some(seed),
            ..DetectionConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_detector_creation() {
        let detector = AnomalyDetector::new();
        assert_eq!(detector.config().num_trees, 100);
        assert!(AnomalyDetector::with_config(DetectionConfig {
            contamination: 2.0,
            ..DetectionConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_empty_batch_short_circuits() {
        let outcome = AnomalyDetector::new().scan(&[]).unwrap();
        assert_eq!(outcome, ScanOutcome::NoTransactions);
        assert!(outcome.report().is_none());
    }

    #[test]
    fn test_high_value_transfer_flagged() {
        let txs = vec![
            Transaction::new("A", "B", 10.0),
            Transaction::new("A", "B", 12.0),
            Transaction::new("A", "B", 9.0),
            Transaction::new("A", "B", 10000.0),
        ];
        let report = seeded_detector(7, 0.25).scan(&txs).unwrap().into_report().unwrap();

        assert_eq!(report.len(), 4);
        assert_eq!(report.anomaly_count(), 1);
        assert!(report.verdicts[3].is_anomaly);
        assert_eq!(report.rows[3].reason, SUSPICIOUS_REASON);
        assert_eq!(report.rows[0].reason, NORMAL_REASON);
        assert_eq!(report.anomalies().next().map(|r| r.amount), Some(10000.0));
    }

    #[test]
    fn test_singleton_is_normal() {
        let txs = vec![Transaction::new("A", "B", 500.0)];
        let report = seeded_detector(1, 0.9).scan(&txs).unwrap().into_report().unwrap();
        assert_eq!(report.anomaly_count(), 0);
        assert_eq!(report.rows[0].reason, NORMAL_REASON);
    }

    #[test]
    fn test_seeded_scan_is_reproducible() {
        let txs: Vec<Transaction> = (0..40)
            .map(|i| Transaction::new("A", "B", (i % 7) as f64 * 3.0 + 1.0))
            .collect();
        let detector = seeded_detector(99, 0.1);
        let a = detector.scan(&txs).unwrap().into_report().unwrap();
        let b = detector.scan(&txs).unwrap().into_report().unwrap();
        assert_eq!(a.verdicts, b.verdicts);
    }

    #[test]
    fn test_invalid_amount_fails_whole_scan() {
        let txs = vec![Transaction::new("A", "B", 1.0), Transaction::new("A", "B", f64::NAN)];
        assert!(AnomalyDetector::new().scan(&txs).is_err());
    }

    #[test]
    fn test_set_contamination() {
        let mut detector = AnomalyDetector::new();
        assert!(detector.set_contamination(0.3).is_ok());
        assert_eq!(detector.config().contamination, 0.3);
        assert!(detector.set_contamination(1.0).is_err());
        assert_eq!(detector.config().contamination, 0.3);
    }
}
