// crates/mp_transport/src/particles.rs

//! 拉格朗日粒子集合
//!
//! 每个正浓度单元释放 `k` 个粒子，位置在单元覆盖范围内均匀随机，
//! 权重为 `c / k`。粒子只在播种时创建，运行过程中数量固定，
//! 只有位置会变化。
//!
//! 流水线各阶段按值接收 [`ParticleSet`] 并返回更新后的集合，
//! 同一时刻只有一个阶段持有缓冲区。

use mp_foundation::KahanSum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::Grid;

/// 单个粒子
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// 纬度 [°]
    pub lat: f64,
    /// 经度 [°]
    pub lon: f64,
    /// 质量权重（非负）
    pub weight: f64,
}

impl Particle {
    /// 创建粒子
    #[inline]
    pub fn new(lat: f64, lon: f64, weight: f64) -> Self {
        Self { lat, lon, weight }
    }
}

/// 粒子集合（顺序无意义）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    /// 从粒子列表创建
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    /// 从网格浓度播种
    ///
    /// `rng` 由调用方注入，测试中可使用固定种子复现。
    /// 网格不被修改。
    pub fn seed_from_grid<R: Rng + ?Sized>(
        grid: &Grid,
        particles_per_cell: usize,
        rng: &mut R,
    ) -> Self {
        let k = particles_per_cell;
        if k == 0 {
            return Self::default();
        }

        let (lats, lons) = (grid.lats(), grid.lons());
        let mut particles = Vec::with_capacity(grid.positive_cells() * k);

        for ((i, j), &c) in grid.concentration().indexed_iter() {
            if c <= 0.0 {
                continue;
            }
            let (lat_lo, lat_hi) = (lats.lower_edge(i), lats.upper_edge(i));
            let (lon_lo, lon_hi) = (lons.lower_edge(j), lons.upper_edge(j));
            let weight = c / k as f64;
            for _ in 0..k {
                particles.push(Particle {
                    lat: rng.gen_range(lat_lo..lat_hi),
                    lon: rng.gen_range(lon_lo..lon_hi),
                    weight,
                });
            }
        }

        debug!("播种完成: {} 个粒子", particles.len());
        Self { particles }
    }

    /// 粒子数
    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// 只读访问
    #[inline]
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    /// 可变访问（由当前持有集合的阶段独占）
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// 迭代器
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    /// 总权重（补偿求和）
    pub fn total_weight(&self) -> f64 {
        KahanSum::sum_iter(self.particles.iter().map(|p| p.weight))
    }
}
