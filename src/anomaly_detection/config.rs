//! 异常检测配置模块
//!
//! 文件（JSON / TOML）→ 环境变量 → 命令行参数，逐层覆盖

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::errors::{AnomalyDetectionError, Result};

/// 默认树的数量
pub const DEFAULT_NUM_TREES: usize = 100;
/// 默认子采样上限
pub const DEFAULT_MAX_SUBSAMPLE: usize = 256;
/// 默认异常比例
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

pub const ENV_NUM_TREES: &str = "LEDGER_SCAN_NUM_TREES";
pub const ENV_SUBSAMPLE_SIZE: &str = "LEDGER_SCAN_SUBSAMPLE_SIZE";
pub const ENV_CONTAMINATION: &str = "LEDGER_SCAN_CONTAMINATION";
pub const ENV_SEED: &str = "LEDGER_SCAN_SEED";

/// 异常检测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    /// 孤立树数量
    #[serde(alias = "num_trees")]
    pub num_trees: usize,

    /// 每棵树的子采样大小；`None` 表示 `min(256, batch)`
    #[serde(alias = "subsample_size")]
    pub subsample_size: Option<usize>,

    /// 预期异常比例，取值 `[0, 1)`
    pub contamination: f64,

    /// 固定随机种子（可复现运行）
    #[serde(alias = "random_seed")]
    pub random_seed: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            num_trees: DEFAULT_NUM_TREES,
            subsample_size: None,
            contamination: DEFAULT_CONTAMINATION,
            random_seed: None,
        }
    }
}

impl DetectionConfig {
    /// from文件加载配置，`.toml` 走 TOML，其余按 JSON 解析
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: Self = if is_toml {
            toml::from_str(&content)
                .map_err(|e| AnomalyDetectionError::Configuration(format!("{}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| AnomalyDetectionError::Configuration(format!("{}: {}", path.display(), e)))?
        };
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件（JSON）
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AnomalyDetectionError::Configuration(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `LEDGER_SCAN_*` environment variables that are set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = read_env::<usize>(ENV_NUM_TREES)? {
            self.num_trees = v;
        }
        if let Some(v) = read_env::<usize>(ENV_SUBSAMPLE_SIZE)? {
            self.subsample_size = Some(v);
        }
        if let Some(v) = read_env::<f64>(ENV_CONTAMINATION)? {
            self.contamination = v;
        }
        if let Some(v) = read_env::<u64>(ENV_SEED)? {
            self.random_seed = Some(v);
        }
        Ok(())
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(AnomalyDetectionError::invalid(
                "num_trees must be at least 1",
            ));
        }
        if self.subsample_size == Some(0) {
            return Err(AnomalyDetectionError::invalid(
                "subsample_size must be at least 1",
            ));
        }
        validate_contamination(self.contamination)
    }

    /// 实际使用的子采样大小（已按 batch 大小截断）
    pub fn effective_subsample_size(&self, batch_len: usize) -> usize {
        self.subsample_size
            .unwrap_or(DEFAULT_MAX_SUBSAMPLE)
            .min(batch_len)
    }
}

/// contamination 必须落在 `[0, 1)`
pub fn validate_contamination(contamination: f64) -> Result<()> {
    if !(0.0..1.0).contains(&contamination) {
        return Err(AnomalyDetectionError::invalid(format!(
            "contamination must be in [0, 1), got {}",
            contamination
        )));
    }
    Ok(())
}

fn read_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AnomalyDetectionError::Configuration(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_trees, 100);
        assert_eq!(config.contamination, 0.1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = DetectionConfig::default();
        config.contamination = 1.0;
        assert!(config.validate().is_err());

        config.contamination = -0.1;
        assert!(config.validate().is_err());

        config.contamination = 0.0;
        assert!(config.validate().is_ok());

        config.num_trees = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_subsample_size() {
        let mut config = DetectionConfig::default();
        assert_eq!(config.effective_subsample_size(4), 4);
        assert_eq!(config.effective_subsample_size(10_000), 256);

        config.subsample_size = Some(64);
        assert_eq!(config.effective_subsample_size(10), 10);
        assert_eq!(config.effective_subsample_size(1000), 64);
    }

    #[test]
    fn test_config_serialization() {
        let config = DetectionConfig {
            random_seed: Some(7),
            ..DetectionConfig::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("numTrees"));

        let deserialized: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DetectionConfig = serde_json::from_str(r#"{"num_trees": 25}"#).unwrap();
        assert_eq!(config.num_trees, 25);
        assert_eq!(config.contamination, DEFAULT_CONTAMINATION);
        assert_eq!(config.subsample_size, None);
    }
}
