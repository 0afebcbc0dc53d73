// crates/mp_transport/src/runner.rs

//! 预报运行器
//!
//! 驱动完整的预报流程：
//!
//! ```text
//! Seeded ──step()──> Stepping ──finish()──> Finalizing ──(cap)──> Capped
//!    │                                          ^
//!    └─────────── 无正浓度单元 ─────────────────┘
//! ```
//!
//! 每步依次执行 RK4 对流、随机游走扩散和边界处理。每 `save_interval`
//! 步把粒子回落到网格并记录快照；结束时再回落一次，若最后一个快照
//! 恰好在同一步则覆盖它。启用截断时，阈值从最终浓度场计算，
//! 并统一施加到整个快照序列。

use mp_config::ForecastConfig;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::advection::{Rk4Advector, METHOD_LABEL};
use crate::boundary::BoundaryEnforcer;
use crate::capping::{apply_cap, CapSummary, OutlierCapper};
use crate::deposition::{Deposition, Depositor};
use crate::diagnostics::MassBudget;
use crate::diffusion::DiffusionOperator;
use crate::error::TransportResult;
use crate::grid::Grid;
use crate::particles::ParticleSet;
use crate::rng::RngStreams;
use crate::velocity::VelocityField;

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// 粒子已播种，尚未推进
    Seeded,
    /// 正在推进时间步
    Stepping,
    /// 已完成最终回落
    Finalizing,
    /// 已施加离群值截断
    Capped,
}

/// 单个时刻的浓度快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 步数
    pub step: usize,
    /// 距起始时刻的小时数
    pub elapsed_hours: f64,
    /// 浓度场 (n_lat, n_lon)
    pub concentration: Array2<f64>,
}

/// 预报结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// 纬度轴（升序）
    pub lats: Vec<f64>,
    /// 经度轴（升序）
    pub lons: Vec<f64>,
    /// 按时间排序的快照，首个为起始时刻的原始浓度
    pub snapshots: Vec<Snapshot>,
    /// 最终浓度场（已截断，如启用）
    pub final_concentration: Array2<f64>,
    /// 质量收支
    pub budget: MassBudget,
    /// 截断报告
    pub cap: Option<CapSummary>,
    /// 粒子数
    pub particle_count: usize,
    /// 随机数基准种子
    pub seed: u64,
    /// 源数据日期
    pub source_date: String,
    /// 方法标签
    pub method: String,
    /// 实际预报时长 [h]
    pub duration_hours: f64,
    /// 结束时的阶段
    pub phase: RunPhase,
}

impl Forecast {
    /// 各快照的时刻 [h]
    pub fn times(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.elapsed_hours).collect()
    }

    /// 是否为无粒子的退化预报
    pub fn is_degenerate(&self) -> bool {
        self.particle_count == 0
    }
}

/// 预报运行器
pub struct ForecastRunner<'g> {
    grid: &'g Grid,
    config: ForecastConfig,
    streams: RngStreams,
    advector: Rk4Advector<'g>,
    diffusion: DiffusionOperator,
    boundary: BoundaryEnforcer,
    depositor: Depositor<'g>,
    capper: Option<OutlierCapper>,
    particles: ParticleSet,
    phase: RunPhase,
    step: usize,
    snapshots: Vec<Snapshot>,
    budget: MassBudget,
}

impl<'g> ForecastRunner<'g> {
    /// 验证配置并播种粒子
    ///
    /// 未指定种子时从系统熵源抽取，并记录到日志以便复现。
    pub fn new(grid: &'g Grid, config: &ForecastConfig) -> TransportResult<Self> {
        config.validate()?;
        let streams = match config.seed {
            Some(seed) => RngStreams::new(seed),
            None => {
                let streams = RngStreams::from_entropy();
                info!("未指定随机种子，使用 {}", streams.base_seed());
                streams
            }
        };
        let mut rng = streams.seeding();
        Self::with_seeding_rng(grid, config, streams, &mut rng)
    }

    /// 使用注入的随机源播种
    ///
    /// `streams` 仍用于扩散阶段的子流。
    pub fn with_seeding_rng<R: Rng + ?Sized>(
        grid: &'g Grid,
        config: &ForecastConfig,
        streams: RngStreams,
        rng: &mut R,
    ) -> TransportResult<Self> {
        config.validate()?;
        let capper = config.cap_percentile.map(OutlierCapper::new).transpose()?;

        let particles = ParticleSet::seed_from_grid(grid, config.particles_per_cell, rng);
        let budget = MassBudget::new(grid.total_mass(), particles.total_weight());

        let (n_lat, n_lon) = grid.shape();
        info!(
            "播种完成: 网格 {}x{}, {} 个正值单元, {} 个粒子",
            n_lat,
            n_lon,
            grid.positive_cells(),
            particles.len()
        );
        info!(
            "初始质量 {:.6e}, 粒子总权重 {:.6e} ({})",
            budget.source_mass,
            budget.seeded_mass,
            fmt_percent(budget.seeding_percent())
        );

        let threshold = config.parallel_threshold;
        let snapshots = vec![Snapshot {
            step: 0,
            elapsed_hours: 0.0,
            concentration: grid.concentration().clone(),
        }];

        Ok(Self {
            grid,
            config: config.clone(),
            streams,
            advector: Rk4Advector::new(VelocityField::new(grid)).with_parallel_threshold(threshold),
            diffusion: DiffusionOperator::new(config.diffusivity).with_parallel_threshold(threshold),
            boundary: BoundaryEnforcer::for_grid(grid),
            depositor: Depositor::new(grid, config.deposition).with_parallel_threshold(threshold),
            capper,
            particles,
            phase: RunPhase::Seeded,
            step: 0,
            snapshots,
            budget,
        })
    }

    /// 当前阶段
    #[inline]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// 已完成步数
    #[inline]
    pub fn steps_done(&self) -> usize {
        self.step
    }

    /// 当前粒子集合
    #[inline]
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// 已记录的快照
    #[inline]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// 质量收支
    #[inline]
    pub fn budget(&self) -> &MassBudget {
        &self.budget
    }

    fn elapsed_hours(&self) -> f64 {
        self.step as f64 * self.config.dt_hours
    }

    /// 推进一步，返回是否执行了推进
    ///
    /// 所有配置步数完成后返回 `false`，不做任何事。
    pub fn step(&mut self) -> bool {
        if self.step >= self.config.n_steps || self.particles.is_empty() {
            return false;
        }
        self.phase = RunPhase::Stepping;

        let dt = self.config.dt_seconds();
        let particles = std::mem::take(&mut self.particles);
        let particles = self.advector.advect(particles, dt);
        let particles = self.diffusion.apply(particles, dt, &self.streams, self.step as u64);
        self.particles = self.boundary.enforce(particles);
        self.step += 1;

        if self.step % self.config.save_interval == 0 {
            let deposition = self.depositor.deposit(&self.particles);
            self.record(deposition);
            info!(
                "保存快照: 第 {} 步 ({:.1} h), 共 {} 个",
                self.step,
                self.elapsed_hours(),
                self.snapshots.len()
            );
        }

        let interval = self.config.progress_interval;
        if interval > 0 && self.step % interval == 0 {
            info!(
                "进度: {}/{} 步 ({:.1}%)",
                self.step,
                self.config.n_steps,
                self.step as f64 / self.config.n_steps as f64 * 100.0
            );
        }
        true
    }

    fn record(&mut self, deposition: Deposition) {
        let elapsed = self.elapsed_hours();
        let entry = self.budget.record(self.step, elapsed, &deposition);
        info!(
            "第 {} 步回落质量 {:.6e} ({})",
            entry.step,
            entry.deposited_mass,
            fmt_percent(self.budget.percent_of_source(entry.deposited_mass))
        );
        debug!(
            "第 {} 步丢弃 {} 个粒子 ({:.6e})",
            entry.step, entry.dropped_particles, entry.dropped_mass
        );
        let snapshot = Snapshot {
            step: self.step,
            elapsed_hours: elapsed,
            concentration: deposition.concentration,
        };
        match self.snapshots.last_mut() {
            Some(last) if last.step == self.step => *last = snapshot,
            _ => self.snapshots.push(snapshot),
        }
    }

    /// 推进全部步数并收尾
    pub fn run(mut self) -> Forecast {
        if self.particles.is_empty() {
            warn!("网格无正浓度单元，返回原始网格作为单快照预报");
            return self.finish();
        }
        info!(
            "开始推进: {} 步, dt = {} h, K = {} m²/s",
            self.config.n_steps, self.config.dt_hours, self.config.diffusivity
        );
        while self.step() {}
        self.finish()
    }

    /// 最终回落并按需截断
    pub fn finish(mut self) -> Forecast {
        self.phase = RunPhase::Finalizing;

        if self.particles.is_empty() {
            let source = self.grid.concentration().clone();
            return self.into_forecast(source, None, 0.0);
        }

        let deposition = self.depositor.deposit(&self.particles);
        let mut final_concentration = deposition.concentration.clone();
        self.record(deposition);
        info!(
            "最终回落质量 {:.6e} ({})",
            self.budget.final_mass().unwrap_or(0.0),
            fmt_percent(self.budget.final_percent())
        );

        let mut cap = None;
        if let Some(capper) = self.capper {
            let (capped, summary) = capper.cap(&final_concentration);
            if summary.has_threshold() {
                info!(
                    "离群值截断: P{} = {:.6e}, 原最大值 {:.6e}, {} 个单元被截断",
                    summary.percentile, summary.cap_value, summary.original_max, summary.n_capped
                );
                if summary.n_capped > 0 {
                    info!(
                        "截断移除质量 {:.6e} ({})",
                        summary.mass_removed,
                        fmt_percent(summary.removed_percent())
                    );
                }
                for snapshot in &mut self.snapshots {
                    apply_cap(&mut snapshot.concentration, summary.cap_value);
                }
            } else {
                info!("最终浓度无正值单元，跳过截断");
            }
            final_concentration = capped;
            cap = Some(summary);
            self.phase = RunPhase::Capped;
        }

        info!("预报完成: {} 个快照", self.snapshots.len());
        let duration = self.elapsed_hours();
        self.into_forecast(final_concentration, cap, duration)
    }

    fn into_forecast(
        self,
        final_concentration: Array2<f64>,
        cap: Option<CapSummary>,
        duration_hours: f64,
    ) -> Forecast {
        Forecast {
            lats: self.grid.lats().values().to_vec(),
            lons: self.grid.lons().values().to_vec(),
            snapshots: self.snapshots,
            final_concentration,
            budget: self.budget,
            cap,
            particle_count: self.particles.len(),
            seed: self.streams.base_seed(),
            source_date: self.grid.source_date().to_string(),
            method: METHOD_LABEL.to_string(),
            duration_hours,
            phase: self.phase,
        }
    }
}

/// 一次性运行完整预报
pub fn run_forecast(grid: &Grid, config: &ForecastConfig) -> TransportResult<Forecast> {
    Ok(ForecastRunner::new(grid, config)?.run())
}

fn fmt_percent(value: Option<f64>) -> String {
    match value {
        Some(p) => format!("{p:.2}%"),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        let mut c = Array2::zeros((3, 3));
        c[[1, 1]] = 6.0;
        c[[0, 2]] = 3.0;
        Grid::new(
            vec![-1.0, 0.0, 1.0],
            vec![10.0, 11.0, 12.0],
            c,
            Array2::zeros((3, 3)),
            Array2::zeros((3, 3)),
        )
        .unwrap()
    }

    fn config(n_steps: usize, save_interval: usize) -> ForecastConfig {
        ForecastConfig {
            n_steps,
            save_interval,
            diffusivity: 0.0,
            cap_percentile: None,
            seed: Some(1),
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn test_snapshot_schedule() {
        let grid = grid();
        let forecast = run_forecast(&grid, &config(10, 4)).unwrap();
        let steps: Vec<usize> = forecast.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 4, 8, 10]);
        assert_eq!(forecast.times(), vec![0.0, 4.0, 8.0, 10.0]);
        assert_eq!(forecast.duration_hours, 10.0);
        assert_eq!(forecast.phase, RunPhase::Finalizing);
    }

    #[test]
    fn test_final_save_point_not_duplicated() {
        let grid = grid();
        let forecast = run_forecast(&grid, &config(8, 4)).unwrap();
        let steps: Vec<usize> = forecast.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 4, 8]);
        assert_eq!(forecast.budget.save_points.len(), 2);
    }

    #[test]
    fn test_initial_snapshot_is_source_grid() {
        let grid = grid();
        let forecast = run_forecast(&grid, &config(2, 1)).unwrap();
        assert_eq!(&forecast.snapshots[0].concentration, grid.concentration());
    }

    #[test]
    fn test_still_water_preserves_cells() {
        let grid = grid();
        let forecast = run_forecast(&grid, &config(5, 5)).unwrap();
        let last = &forecast.final_concentration;
        assert!((last[[1, 1]] - 6.0).abs() < 1e-9);
        assert!((last[[0, 2]] - 3.0).abs() < 1e-9);
        assert_eq!(forecast.particle_count, 20);
    }

    #[test]
    fn test_step_stops_after_n_steps() {
        let grid = grid();
        let mut runner = ForecastRunner::new(&grid, &config(2, 1)).unwrap();
        assert_eq!(runner.phase(), RunPhase::Seeded);
        assert!(runner.step());
        assert_eq!(runner.phase(), RunPhase::Stepping);
        assert!(runner.step());
        assert!(!runner.step());
        assert_eq!(runner.steps_done(), 2);
    }

    #[test]
    fn test_cap_removal_measured_against_final_field() {
        let grid = grid();
        let mut cfg = config(3, 3);
        cfg.cap_percentile = Some(50.0);
        let forecast = run_forecast(&grid, &cfg).unwrap();
        let cap = forecast.cap.unwrap();

        let final_mass = forecast.budget.final_mass().unwrap();
        assert!((cap.original_mass - final_mass).abs() < 1e-9);
        assert!((cap.cap_value - 4.5).abs() < 1e-9);
        assert!((cap.mass_removed - 1.5).abs() < 1e-9);
        let expected = cap.mass_removed / final_mass * 100.0;
        assert!((cap.removed_percent().unwrap() - expected).abs() < 1e-9);
        assert_eq!(forecast.phase, RunPhase::Capped);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let grid = grid();
        let mut cfg = config(2, 1);
        cfg.dt_hours = -1.0;
        assert!(ForecastRunner::new(&grid, &cfg).is_err());
    }
}
