// crates/mp_transport/src/lib.rs

//! MariHydro 微塑料漂移预报 Transport Layer (Layer 3)
//!
//! 拉格朗日粒子输运引擎：从浓度场播种粒子，在表层流场中做
//! RK4 对流和随机游走扩散，再把粒子回落为浓度场。
//!
//! # 模块概览
//!
//! - [`grid`]: 坐标轴、经度约定和规范化网格
//! - [`velocity`]: 双线性插值流速场
//! - [`particles`]: 粒子集合与播种
//! - [`advection`]: RK4 对流
//! - [`diffusion`]: 随机游走扩散
//! - [`boundary`]: 纬度截断与经度环绕
//! - [`deposition`]: 粒子回落网格
//! - [`capping`]: 百分位离群值截断
//! - [`diagnostics`]: 质量守恒诊断
//! - [`runner`]: 预报运行器
//!
//! # 每步流水线
//!
//! ```text
//! ParticleSet ─> advect ─> diffuse ─> enforce ─> (deposit @ save_interval)
//! ```
//!
//! # 示例
//!
//! ```
//! use mp_config::ForecastConfig;
//! use mp_transport::{run_forecast, Grid};
//! use ndarray::Array2;
//!
//! let mut c = Array2::zeros((2, 2));
//! c[[0, 0]] = 1.0;
//! let grid = Grid::new(
//!     vec![0.0, 1.0],
//!     vec![0.0, 1.0],
//!     c,
//!     Array2::zeros((2, 2)),
//!     Array2::zeros((2, 2)),
//! )
//! .unwrap();
//!
//! let config = ForecastConfig { n_steps: 4, save_interval: 2, seed: Some(1), ..Default::default() };
//! let forecast = run_forecast(&grid, &config).unwrap();
//! assert_eq!(forecast.snapshots.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advection;
pub mod boundary;
pub mod capping;
pub mod deposition;
pub mod diagnostics;
pub mod diffusion;
pub mod error;
pub mod grid;
pub mod particles;
pub mod rng;
pub mod runner;
pub mod units;
pub mod velocity;

// 重导出核心类型
pub use advection::{Rk4Advector, METHOD_LABEL};
pub use boundary::BoundaryEnforcer;
pub use capping::{CapSummary, OutlierCapper};
pub use deposition::{Deposition, Depositor};
pub use diagnostics::{MassBudget, SavePointMass};
pub use diffusion::DiffusionOperator;
pub use error::{TransportError, TransportResult};
pub use grid::{Axis, Grid, LonConvention};
pub use particles::{Particle, ParticleSet};
pub use rng::RngStreams;
pub use runner::{run_forecast, Forecast, ForecastRunner, RunPhase, Snapshot};
pub use velocity::VelocityField;
