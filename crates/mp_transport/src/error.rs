// crates/mp_transport/src/error.rs

//! 输运引擎错误类型
//!
//! 只有输入形状错误和无效运行参数是致命的，并且都在模拟开始前抛出。
//! 数值边缘情况（极区、网格外查询）和空截断输入不会产生错误。

use mp_config::ConfigError;
use mp_foundation::MpError;
use thiserror::Error;

/// 输运引擎结果类型
pub type TransportResult<T> = Result<T, TransportError>;

/// 输运引擎错误
#[derive(Error, Debug)]
pub enum TransportError {
    /// 场数组与坐标轴形状不兼容（转置修复后仍不匹配）
    #[error("场 {field} 形状不兼容: 期望 {expected:?}, 实际 {actual:?}")]
    ShapeMismatch {
        /// 场名称
        field: &'static str,
        /// 期望形状 (n_lat, n_lon)
        expected: (usize, usize),
        /// 实际形状
        actual: (usize, usize),
    },

    /// 坐标轴为空
    #[error("坐标轴 {axis} 为空")]
    EmptyAxis {
        /// 坐标轴名称
        axis: &'static str,
    },

    /// 坐标轴非严格单调或含非有限值
    #[error("坐标轴 {axis} 在索引 {index} 处非严格单调")]
    NonMonotonicAxis {
        /// 坐标轴名称
        axis: &'static str,
        /// 出错位置
        index: usize,
    },

    /// 百分位超出 (0, 100)
    #[error("百分位 {0} 超出 (0, 100) 范围")]
    InvalidPercentile(f64),

    /// 运行参数无效
    #[error("运行参数无效: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransportError> for MpError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ShapeMismatch {
                field,
                expected,
                actual,
            } => MpError::shape_mismatch(field, expected, actual),
            TransportError::InvalidPercentile(p) => {
                MpError::out_of_range("cap_percentile", p, 0.0, 100.0)
            }
            TransportError::Config(e) => e.into(),
            other => MpError::invalid_input(other.to_string()),
        }
    }
}
