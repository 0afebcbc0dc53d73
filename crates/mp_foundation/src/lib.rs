// crates/mp_foundation/src/lib.rs

//! MariHydro 微塑料漂移预报 Foundation Layer
//!
//! 基础层，提供整个项目共享的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型
//! - [`numerics`]: 补偿求和等数值工具
//! - [`units`]: 时间单位换算
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: mp_cli
//! Layer 4: mp_io
//! Layer 3: mp_transport
//! Layer 2: mp_config
//! Layer 1: mp_foundation (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod numerics;
pub mod units;

// 重导出常用类型
pub use error::{MpError, MpResult};
pub use numerics::KahanSum;
