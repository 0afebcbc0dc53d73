// crates/mp_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `MpError` 枚举和 `MpResult` 类型别名，用于整个项目的跨层错误传递。
//!
//! # 设计原则
//!
//! 1. **层次化**: 基础层只定义核心错误，输运相关错误在 `mp_transport` 中定义
//! 2. **易用性**: 提供便捷的构造方法
//! 3. **可追溯**: 支持错误链
//!
//! # 示例
//!
//! ```
//! use mp_foundation::error::{MpError, MpResult};
//!
//! fn read_config() -> MpResult<()> {
//!     Err(MpError::config("配置文件格式错误"))
//! }
//! assert!(read_config().is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type MpResult<T> = Result<T, MpError>;

/// 漂移预报错误类型
#[derive(Error, Debug)]
pub enum MpError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    // ========================================================================
    // 输入数据错误
    // ========================================================================
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组形状不匹配
    #[error("数组形状不匹配: {name} 期望{expected:?}, 实际{actual:?}")]
    ShapeMismatch {
        /// 数据名称
        name: String,
        /// 期望形状 (行, 列)
        expected: (usize, usize),
        /// 实际形状 (行, 列)
        actual: (usize, usize),
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    // ========================================================================
    // 配置错误
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl MpError {
    /// 从IO错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 形状不匹配
    pub fn shape_mismatch(
        name: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// 超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MpError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = MpError::shape_mismatch("u_current", (3, 4), (2, 5));
        let msg = err.to_string();
        assert!(msg.contains("u_current"));
        assert!(msg.contains("(3, 4)"));
        assert!(msg.contains("(2, 5)"));
    }

    #[test]
    fn test_io_with_source_keeps_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err = MpError::io_with_source("读取失败", io_err);
        assert!(err.to_string().contains("读取失败"));
        assert!(err.source().is_some());
    }
}
