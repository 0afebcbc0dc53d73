// crates/mp_transport/src/deposition.rs

//! 粒子回落网格
//!
//! 每个粒子归属到一个网格单元，把权重累加到该单元。
//! 网格包络外的粒子被丢弃，丢弃数量和质量计入诊断。
//!
//! # 归属规则
//!
//! - [`DepositionRule::Nearest`]: 包含粒子坐标的单元，即
//!   `lat ∈ [lat_i - Δ/2, lat_i + Δ/2)`
//! - [`DepositionRule::LeftInsertion`]: 有序查找的左插入点，
//!   会产生系统性的半格偏移，保留用于对比旧结果
//!
//! # 并行
//!
//! 多个粒子可能落入同一单元，并行时每个工作线程累加到私有的部分网格，
//! 最后归约合并，不共享可变数组。

use mp_config::DepositionRule;
use mp_foundation::KahanSum;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::advection::DEFAULT_PARALLEL_THRESHOLD;
use crate::grid::Grid;
use crate::particles::{Particle, ParticleSet};
use crate::rng::PARTICLE_CHUNK;

/// 一次回落的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposition {
    /// 浓度场 (n_lat, n_lon)，非负
    pub concentration: Array2<f64>,
    /// 落入网格的总质量
    pub deposited_mass: f64,
    /// 落在包络外的粒子数
    pub dropped_particles: usize,
    /// 落在包络外的质量
    pub dropped_mass: f64,
}

/// 工作线程私有的部分累加器
struct Partial {
    grid: Array2<f64>,
    dropped: usize,
    dropped_mass: KahanSum,
}

impl Partial {
    fn zeros(shape: (usize, usize)) -> Self {
        Self {
            grid: Array2::zeros(shape),
            dropped: 0,
            dropped_mass: KahanSum::new(),
        }
    }

    #[inline]
    fn add(&mut self, cell: Option<(usize, usize)>, weight: f64) {
        match cell {
            Some((i, j)) => self.grid[[i, j]] += weight,
            None => {
                self.dropped += 1;
                self.dropped_mass.add(weight);
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.grid += &other.grid;
        self.dropped += other.dropped;
        self.dropped_mass = self.dropped_mass.merge(other.dropped_mass);
        self
    }
}

/// 粒子回落器
#[derive(Debug, Clone, Copy)]
pub struct Depositor<'g> {
    grid: &'g Grid,
    rule: DepositionRule,
    parallel_threshold: usize,
}

impl<'g> Depositor<'g> {
    /// 创建回落器
    pub fn new(grid: &'g Grid, rule: DepositionRule) -> Self {
        Self {
            grid,
            rule,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// 设置并行阈值
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// 归属规则
    #[inline]
    pub fn rule(&self) -> DepositionRule {
        self.rule
    }

    /// 粒子所在单元 (i, j)，包络外返回 `None`
    #[inline]
    pub fn locate(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        let lats = self.grid.lats();
        match self.rule {
            DepositionRule::Nearest => {
                Some((lats.locate_cell(lat)?, self.grid.locate_lon_cell(lon)?))
            }
            DepositionRule::LeftInsertion => Some((
                lats.locate_insertion(lat)?,
                self.grid.lons().locate_insertion(lon)?,
            )),
        }
    }

    /// 将粒子权重累加到网格
    pub fn deposit(&self, particles: &ParticleSet) -> Deposition {
        let shape = self.grid.shape();
        let accumulate = |mut acc: Partial, p: &Particle| {
            acc.add(self.locate(p.lat, p.lon), p.weight);
            acc
        };

        let slice = particles.as_slice();
        let partial = if slice.len() >= self.parallel_threshold {
            slice
                .par_iter()
                .with_min_len(PARTICLE_CHUNK)
                .fold(|| Partial::zeros(shape), accumulate)
                .reduce(|| Partial::zeros(shape), Partial::merge)
        } else {
            slice.iter().fold(Partial::zeros(shape), accumulate)
        };

        let deposited_mass = KahanSum::sum_iter(partial.grid.iter().copied());
        Deposition {
            concentration: partial.grid,
            deposited_mass,
            dropped_particles: partial.dropped,
            dropped_mass: partial.dropped_mass.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn grid() -> Grid {
        Grid::new(
            vec![0.0, 1.0, 2.0],
            vec![10.0, 11.0, 12.0, 13.0],
            Array2::zeros((3, 4)),
            Array2::zeros((3, 4)),
            Array2::zeros((3, 4)),
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_rule_uses_containing_cell() {
        let grid = grid();
        let dep = Depositor::new(&grid, DepositionRule::Nearest);
        assert_eq!(dep.locate(0.2, 10.2), Some((0, 0)));
        assert_eq!(dep.locate(0.6, 10.6), Some((1, 1)));
        assert_eq!(dep.locate(-0.4, 13.4), Some((0, 3)));
        assert_eq!(dep.locate(2.5, 11.0), None);
    }

    #[test]
    fn test_nearest_rule_wraps_first_cell() {
        let grid = Grid::new(
            vec![0.0],
            vec![0.0, 1.0, 2.0],
            Array2::zeros((1, 3)),
            Array2::zeros((1, 3)),
            Array2::zeros((1, 3)),
        )
        .unwrap();
        let dep = Depositor::new(&grid, DepositionRule::Nearest);
        // -0.2 经规范化后为 359.8，仍属于经度 0 的单元
        assert_eq!(dep.locate(0.0, 359.8), Some((0, 0)));
        assert_eq!(dep.locate(0.0, 180.0), None);
    }

    #[test]
    fn test_left_insertion_rule_shifts_half_cell() {
        let grid = grid();
        let dep = Depositor::new(&grid, DepositionRule::LeftInsertion);
        assert_eq!(dep.locate(0.2, 10.2), Some((1, 1)));
        assert_eq!(dep.locate(1.0, 11.0), Some((1, 1)));
        assert_eq!(dep.locate(-40.0, 10.0), Some((0, 0)));
        assert_eq!(dep.locate(2.2, 11.0), None);
    }

    #[test]
    fn test_mass_accounting() {
        let grid = grid();
        let set = ParticleSet::from_particles(vec![
            Particle::new(0.1, 10.1, 1.0),
            Particle::new(0.2, 10.3, 2.0),
            Particle::new(1.9, 12.9, 4.0),
            Particle::new(30.0, 10.0, 8.0),
        ]);
        let out = Depositor::new(&grid, DepositionRule::Nearest).deposit(&set);
        assert_eq!(out.concentration[[0, 0]], 3.0);
        assert_eq!(out.concentration[[2, 3]], 4.0);
        assert_eq!(out.deposited_mass, 7.0);
        assert_eq!(out.dropped_particles, 1);
        assert_eq!(out.dropped_mass, 8.0);
        assert!(out.concentration.iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn test_parallel_reduction_matches_sequential() {
        let grid = grid();
        let particles: Vec<Particle> = (0..20_000)
            .map(|k| {
                let lat = -0.4 + (k % 29) as f64 * 0.1;
                let lon = 9.6 + (k % 41) as f64 * 0.1;
                Particle::new(lat, lon, 0.5)
            })
            .collect();
        let set = ParticleSet::from_particles(particles);
        let seq = Depositor::new(&grid, DepositionRule::Nearest)
            .with_parallel_threshold(usize::MAX)
            .deposit(&set);
        let par = Depositor::new(&grid, DepositionRule::Nearest)
            .with_parallel_threshold(0)
            .deposit(&set);

        // 权重为 0.5，部分和均可精确表示
        assert_eq!(seq.concentration, par.concentration);
        assert_eq!(seq.dropped_particles, par.dropped_particles);
        assert_eq!(seq.deposited_mass + seq.dropped_mass, 10_000.0);
    }
}
