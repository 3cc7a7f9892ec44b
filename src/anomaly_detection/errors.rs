//! 异常检测error类型
//!
//! 评分引擎是纯计算模块：所有非法输入都在调用边界立即报错，不返回部分结果

use thiserror::Error;

/// 异常检测error类型
#[derive(Debug, Error)]
pub enum AnomalyDetectionError {
    /// 无效参数（空样本、非有限金额、contamination 越界等）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// transaction与预测结果数量不一致
    #[error("Length mismatch: {transactions} transactions vs {predictions} predictions")]
    LengthMismatch {
        transactions: usize,
        predictions: usize,
    },

    /// 配置error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 异常检测结果类型
pub type Result<T> = std::result::Result<T, AnomalyDetectionError>;

impl AnomalyDetectionError {
    /// 便捷构造 InvalidArgument
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// 判断是否为调用方传入的非法数据
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::LengthMismatch { .. }
        )
    }

    /// fetch error上下文信息
    pub fn context(&self) -> String {
        match self {
            Self::LengthMismatch {
                transactions,
                predictions,
            } => format!("transactions={}, predictions={}", transactions, predictions),
            _ => "No additional context".to_string(),
        }
    }
}
