// crates/mp_config/src/lib.rs

//! MariHydro 微塑料漂移预报 Config Layer (Layer 2)
//!
//! 配置层，提供扁平的预报运行参数及其验证。
//!
//! # 模块概览
//!
//! - [`forecast_config`]: ForecastConfig 运行配置（全部字段带默认值）
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod forecast_config;

// 重导出核心类型
pub use error::ConfigError;
pub use forecast_config::{DepositionRule, ForecastConfig};
