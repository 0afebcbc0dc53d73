// apps/mp_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示默认配置和输入快照概要。

use anyhow::{Context, Result};
use clap::Args;
use mp_config::ForecastConfig;
use mp_io::{load_grid, GridSummary};
use mp_transport::METHOD_LABEL;
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 输入快照路径
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== MariHydro 信息 ===");

    if args.defaults || args.input.is_none() {
        print_default_config()?;
    }

    if let Some(path) = &args.input {
        if args.defaults {
            println!();
        }
        let grid = load_grid(path).with_context(|| format!("无法读取输入 {}", path.display()))?;
        print_grid_summary(&GridSummary::from_grid(&grid));
    }

    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    println!("MariHydro 微塑料漂移预报 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("方法: {}", METHOD_LABEL);

    let config = ForecastConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_grid_summary(summary: &GridSummary) {
    println!("=== 输入快照 ===");
    println!("来源日期: {}", summary.date);
    println!("网格: {} x {} (lat x lon)", summary.shape.0, summary.shape.1);
    println!("纬度范围: [{}, {}]", summary.lat_range.0, summary.lat_range.1);
    println!("经度范围: [{}, {}], 约定 {}", summary.lon_range.0, summary.lon_range.1, summary.convention);
    println!("总质量: {:.6e}", summary.total_mass);
    println!("正值单元: {}", summary.positive_cells);
    println!("最大浓度: {:.6e}", summary.max_concentration);
    println!("最大流速: {:.3} m/s", summary.max_speed);
}
