// apps/mp_cli/src/commands/run.rs

//! 运行预报命令
//!
//! 读取输入快照，合并配置文件与命令行覆盖项，运行预报并写出数据集。

use anyhow::{Context, Result};
use clap::Args;
use mp_config::{DepositionRule, ForecastConfig};
use mp_io::{load_grid, ForecastDataset};
use mp_transport::ForecastRunner;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// 运行预报参数
#[derive(Args)]
pub struct RunArgs {
    /// 输入快照 (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// 输出数据集路径
    #[arg(short, long, default_value = "forecast.json")]
    pub output: PathBuf,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 每个正浓度单元的粒子数
    #[arg(long)]
    pub particles_per_cell: Option<usize>,

    /// 时间步长 [h]
    #[arg(long)]
    pub dt_hours: Option<f64>,

    /// 时间步数
    #[arg(long)]
    pub steps: Option<usize>,

    /// 水平扩散系数 [m²/s]
    #[arg(long)]
    pub diffusivity: Option<f64>,

    /// 截断百分位
    #[arg(long, conflicts_with = "no_cap")]
    pub cap_percentile: Option<f64>,

    /// 不做离群值截断
    #[arg(long)]
    pub no_cap: bool,

    /// 快照间隔 [步]
    #[arg(long)]
    pub save_interval: Option<usize>,

    /// 随机数种子
    #[arg(long)]
    pub seed: Option<u64>,

    /// 单元归属规则 (nearest, left_insertion)
    #[arg(long)]
    pub deposition: Option<DepositionRule>,
}

/// 合并配置文件和命令行覆盖项
pub fn build_config(args: &RunArgs) -> Result<ForecastConfig> {
    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => ForecastConfig::default(),
    };

    if let Some(k) = args.particles_per_cell {
        config.particles_per_cell = k;
    }
    if let Some(dt) = args.dt_hours {
        config.dt_hours = dt;
    }
    if let Some(n) = args.steps {
        config.n_steps = n;
    }
    if let Some(kh) = args.diffusivity {
        config.diffusivity = kh;
    }
    if let Some(p) = args.cap_percentile {
        config.cap_percentile = Some(p);
    }
    if args.no_cap {
        config.cap_percentile = None;
    }
    if let Some(interval) = args.save_interval {
        config.save_interval = interval;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(rule) = args.deposition {
        config.deposition = rule;
    }

    config.validate().context("配置无效")?;
    Ok(config)
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== MariHydro 微塑料漂移预报启动 ===");

    let config = build_config(&args)?;
    info!(
        "配置: {} 粒子/单元, dt = {} h, {} 步 ({} h), K = {} m²/s, 截断 {:?}, 归属规则 {}",
        config.particles_per_cell,
        config.dt_hours,
        config.n_steps,
        config.total_hours(),
        config.diffusivity,
        config.cap_percentile,
        config.deposition.name()
    );

    let grid = load_grid(&args.input)
        .with_context(|| format!("无法读取输入 {}", args.input.display()))?;

    let start = Instant::now();
    let forecast = ForecastRunner::new(&grid, &config)
        .context("初始化预报失败")?
        .run();
    let elapsed = start.elapsed();

    let dataset = ForecastDataset::from_forecast(&forecast)
        .context("整理预报数据集失败")?
        .with_config(&config);
    dataset
        .save(&args.output)
        .with_context(|| format!("无法写出 {}", args.output.display()))?;

    info!("=== 预报完成 ===");
    info!("计算时间: {:.2} s", elapsed.as_secs_f64());

    println!("=== 预报结果 ===");
    println!("来源日期: {}", forecast.source_date);
    println!("方法: {}", forecast.method);
    println!("粒子数: {}", forecast.particle_count);
    println!("随机种子: {}", forecast.seed);
    println!("预报时长: {} h", forecast.duration_hours);
    println!("时刻数: {}", dataset.n_times());
    if forecast.is_degenerate() {
        println!("输入无正浓度单元，输出仅含起始时刻");
    }
    if let Some(last) = dataset.last_snapshot() {
        println!("最终最大浓度: {:.6e}", last.iter().copied().fold(0.0, f64::max));
    }
    if let Some(percent) = forecast.budget.final_percent() {
        println!("最终质量守恒: {:.2}%", percent);
    }
    if let Some(cap) = forecast.cap.filter(|c| c.has_threshold()) {
        println!(
            "截断: P{} = {:.6e} ({} 个单元)",
            cap.percentile, cap.cap_value, cap.n_capped
        );
    }
    println!("输出: {}", args.output.display());

    Ok(())
}
