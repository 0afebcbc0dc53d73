// crates/mp_io/src/error.rs
//! IO 错误类型定义
//!
//! 提供 IO 模块的统一错误枚举，支持通过 thiserror 自动转换底层错误。
//! 所有错误最终可转换为 MpError 以实现跨层错误传递。

use mp_foundation::MpError;
use mp_transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 文件不存在
    #[error("文件不存在: {0}")]
    FileNotFound(PathBuf),

    /// 底层 IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析或序列化失败
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 二维数组行长度不一致
    #[error("变量 {variable} 第 {row} 行长度为 {actual}, 期望 {expected}")]
    RaggedRows {
        /// 变量名
        variable: &'static str,
        /// 出错行
        row: usize,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 数据集内部不一致
    #[error("数据集不一致: {0}")]
    InconsistentDataset(String),

    /// 网格构建失败
    #[error("网格无效: {0}")]
    Grid(#[from] TransportError),
}

impl From<IoError> for MpError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::FileNotFound(path) => MpError::file_not_found(path),
            IoError::Io(e) => MpError::io_with_source("文件读写失败", e),
            IoError::Json(e) => MpError::serialization(e.to_string()),
            IoError::RaggedRows {
                variable,
                row,
                expected,
                actual,
            } => MpError::invalid_input(format!(
                "变量 {variable} 第 {row} 行长度为 {actual}, 期望 {expected}"
            )),
            IoError::InconsistentDataset(msg) => MpError::invalid_input(msg),
            IoError::Grid(e) => e.into(),
        }
    }
}
