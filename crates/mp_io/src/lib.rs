// crates/mp_io/src/lib.rs

//! MariHydro 微塑料漂移预报 IO 模块 (Layer 4)
//!
//! 提供输入快照读取和预报数据集输出。
//!
//! # 模块
//!
//! - [`input`]: JSON 网格快照读取与概要统计
//! - [`output`]: `(time, lat, lon)` 预报数据集
//! - [`error`]: IO 错误类型
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use mp_io::{load_grid, ForecastDataset};
//! use mp_transport::run_forecast;
//!
//! let grid = load_grid("snapshot.json")?;
//! let forecast = run_forecast(&grid, &config)?;
//! ForecastDataset::from_forecast(&forecast)?.save("forecast.json")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod input;
pub mod output;

// 重导出常用类型
pub use error::{IoError, IoResult};
pub use input::{load_grid, GridInput, GridSummary};
pub use output::{ForecastDataset, ForecastMetadata, TIME_UNITS};
