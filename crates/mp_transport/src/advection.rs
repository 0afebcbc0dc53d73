// crates/mp_transport/src/advection.rs

//! 四阶 Runge-Kutta 粒子对流
//!
//! 每个粒子每步做四次流速场求值：
//!
//! ```text
//! k1 = f(x)
//! k2 = f(x + ½·dt·k1)
//! k3 = f(x + ½·dt·k2)
//! k4 = f(x + dt·k3)
//! Δ  = dt·(k1 + 2k2 + 2k3 + k4) / 6
//! ```
//!
//! 这是每步最主要的计算开销。不同粒子相互独立，
//! 超过并行阈值时用 rayon 按粒子并行。

use rayon::prelude::*;

use crate::particles::{Particle, ParticleSet};
use crate::velocity::VelocityField;

/// 积分方法标签
pub const METHOD_LABEL: &str = "Lagrangian particle tracking (RK4)";

/// 默认并行阈值（粒子数）
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2000;

/// RK4 对流器
#[derive(Debug, Clone, Copy)]
pub struct Rk4Advector<'g> {
    field: VelocityField<'g>,
    parallel_threshold: usize,
}

impl<'g> Rk4Advector<'g> {
    /// 创建对流器
    pub fn new(field: VelocityField<'g>) -> Self {
        Self {
            field,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// 设置并行阈值
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// 单点 RK4 位移 (Δlat, Δlon) [°]
    #[inline]
    pub fn displacement(&self, lat: f64, lon: f64, dt_seconds: f64) -> (f64, f64) {
        let f = |la: f64, lo: f64| {
            let (dlat, dlon) = self.field.angular_rate(la, lo);
            (dlat * dt_seconds, dlon * dt_seconds)
        };
        let k1 = f(lat, lon);
        let k2 = f(lat + 0.5 * k1.0, lon + 0.5 * k1.1);
        let k3 = f(lat + 0.5 * k2.0, lon + 0.5 * k2.1);
        let k4 = f(lat + k3.0, lon + k3.1);
        (
            (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0) / 6.0,
            (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1) / 6.0,
        )
    }

    /// 推进所有粒子位置，权重不变
    pub fn advect(&self, mut particles: ParticleSet, dt_seconds: f64) -> ParticleSet {
        let step = |p: &mut Particle| {
            let (dlat, dlon) = self.displacement(p.lat, p.lon, dt_seconds);
            p.lat += dlat;
            p.lon += dlon;
        };

        let slice = particles.as_mut_slice();
        if slice.len() >= self.parallel_threshold {
            slice.par_iter_mut().for_each(step);
        } else {
            slice.iter_mut().for_each(step);
        }
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::units::METERS_PER_DEGREE;
    use ndarray::Array2;

    fn uniform_grid(u: f64, v: f64) -> Grid {
        let lats: Vec<f64> = (0..21).map(|i| -10.0 + i as f64).collect();
        let lons: Vec<f64> = (0..21).map(|i| 100.0 + i as f64).collect();
        Grid::new(
            lats,
            lons,
            Array2::zeros((21, 21)),
            Array2::from_elem((21, 21), u),
            Array2::from_elem((21, 21), v),
        )
        .unwrap()
    }

    #[test]
    fn test_meridional_flow_displacement() {
        let grid = uniform_grid(0.0, 1.11);
        let advector = Rk4Advector::new(VelocityField::new(&grid));
        let (dlat, dlon) = advector.displacement(0.0, 110.0, 3600.0);
        let expected = 1.11 * 3600.0 / METERS_PER_DEGREE;
        assert!((dlat - expected).abs() < 1e-12);
        assert_eq!(dlon, 0.0);
    }

    #[test]
    fn test_weights_untouched() {
        let grid = uniform_grid(0.5, 0.5);
        let advector = Rk4Advector::new(VelocityField::new(&grid));
        let set = ParticleSet::from_particles(vec![Particle::new(1.0, 105.0, 3.5)]);
        let out = advector.advect(set, 600.0);
        assert_eq!(out.as_slice()[0].weight, 3.5);
        assert!(out.as_slice()[0].lat > 1.0);
        assert!(out.as_slice()[0].lon > 105.0);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let grid = uniform_grid(0.3, -0.2);
        let field = VelocityField::new(&grid);
        let particles: Vec<Particle> = (0..64)
            .map(|i| Particle::new(-5.0 + 0.1 * i as f64, 102.0 + 0.2 * i as f64, 1.0))
            .collect();
        let set = ParticleSet::from_particles(particles);
        let seq = Rk4Advector::new(field)
            .with_parallel_threshold(usize::MAX)
            .advect(set.clone(), 3600.0);
        let par = Rk4Advector::new(field)
            .with_parallel_threshold(0)
            .advect(set, 3600.0);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_outside_grid_does_not_move() {
        let grid = uniform_grid(1.0, 1.0);
        let advector = Rk4Advector::new(VelocityField::new(&grid));
        assert_eq!(advector.displacement(50.0, 0.0, 3600.0), (0.0, 0.0));
    }
}
