// crates/mp_transport/src/diffusion.rs

//! 随机游走水平扩散
//!
//! 用随机游走近似各向同性湍流扩散：
//!
//! $$\sigma_{lat} = \frac{\sqrt{2 K_h \Delta t}}{111000}, \quad
//!   \sigma_{lon} = \frac{\sigma_{lat}}{\cos\varphi}$$
//!
//! 经向标准差按 `1/cos(lat)` 放大以修正经线收敛，纬度取扰动前
//! （对流后）的值。每步必须在对流之后执行。

use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::advection::DEFAULT_PARALLEL_THRESHOLD;
use crate::particles::ParticleSet;
use crate::rng::{RngStreams, PARTICLE_CHUNK};
use crate::units::{meridian_scale, METERS_PER_DEGREE};

/// 随机游走扩散算子
#[derive(Debug, Clone, Copy)]
pub struct DiffusionOperator {
    diffusivity: f64,
    parallel_threshold: usize,
}

impl DiffusionOperator {
    /// 创建扩散算子
    ///
    /// - `diffusivity`: 水平扩散系数 K_h [m²/s]
    pub fn new(diffusivity: f64) -> Self {
        Self {
            diffusivity: diffusivity.max(0.0),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// 设置并行阈值
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// 扩散系数 [m²/s]
    #[inline]
    pub fn diffusivity(&self) -> f64 {
        self.diffusivity
    }

    /// 纬向位移标准差 [°]
    #[inline]
    pub fn lat_sigma(&self, dt_seconds: f64) -> f64 {
        (2.0 * self.diffusivity * dt_seconds).sqrt() / METERS_PER_DEGREE
    }

    /// 对所有粒子施加随机扰动
    ///
    /// `step` 用于选择随机子流，相同 `(streams, step)` 得到相同扰动。
    pub fn apply(
        &self,
        mut particles: ParticleSet,
        dt_seconds: f64,
        streams: &RngStreams,
        step: u64,
    ) -> ParticleSet {
        let sigma = self.lat_sigma(dt_seconds);
        if !(sigma > 0.0) {
            return particles;
        }

        let perturb_chunk = |(c, chunk): (usize, &mut [crate::particles::Particle])| {
            let mut rng = streams.stream(step, c as u64);
            for p in chunk.iter_mut() {
                let sigma_lon = sigma / meridian_scale(p.lat);
                let z_lat: f64 = rng.sample(StandardNormal);
                let z_lon: f64 = rng.sample(StandardNormal);
                p.lat += sigma * z_lat;
                p.lon += sigma_lon * z_lon;
            }
        };

        let slice = particles.as_mut_slice();
        if slice.len() >= self.parallel_threshold {
            slice
                .par_chunks_mut(PARTICLE_CHUNK)
                .enumerate()
                .for_each(perturb_chunk);
        } else {
            slice
                .chunks_mut(PARTICLE_CHUNK)
                .enumerate()
                .for_each(perturb_chunk);
        }
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Particle;

    fn cloud(n: usize, lat: f64) -> ParticleSet {
        ParticleSet::from_particles(vec![Particle::new(lat, 20.0, 1.0); n])
    }

    #[test]
    fn test_zero_diffusivity_is_identity() {
        let set = cloud(100, 10.0);
        let out = DiffusionOperator::new(0.0).apply(set.clone(), 3600.0, &RngStreams::new(1), 0);
        assert_eq!(out, set);
    }

    #[test]
    fn test_spread_matches_sigma() {
        let n = 20_000;
        let op = DiffusionOperator::new(10.0);
        let dt = 3600.0;
        let out = op.apply(cloud(n, 0.0), dt, &RngStreams::new(5), 0);

        let mean = out.iter().map(|p| p.lat).sum::<f64>() / n as f64;
        let var = out.iter().map(|p| (p.lat - mean).powi(2)).sum::<f64>() / n as f64;
        let sigma = op.lat_sigma(dt);
        assert!((var.sqrt() / sigma - 1.0).abs() < 0.05);
        assert!(out.iter().all(|p| p.weight == 1.0));
    }

    #[test]
    fn test_longitude_spread_grows_with_latitude() {
        let n = 20_000;
        let op = DiffusionOperator::new(10.0);
        let spread = |lat: f64| {
            let out = op.apply(cloud(n, lat), 3600.0, &RngStreams::new(8), 0);
            let mean = out.iter().map(|p| p.lon).sum::<f64>() / n as f64;
            (out.iter().map(|p| (p.lon - mean).powi(2)).sum::<f64>() / n as f64).sqrt()
        };
        let ratio = spread(60.0) / spread(0.0);
        assert!((ratio - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_deterministic_and_thread_independent() {
        let set = cloud(10_000, 30.0);
        let streams = RngStreams::new(77);
        let seq = DiffusionOperator::new(5.0)
            .with_parallel_threshold(usize::MAX)
            .apply(set.clone(), 1800.0, &streams, 3);
        let par = DiffusionOperator::new(5.0)
            .with_parallel_threshold(0)
            .apply(set, 1800.0, &streams, 3);
        assert_eq!(seq, par);
    }
}
