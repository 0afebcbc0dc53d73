// crates/mp_transport/src/boundary.rs

//! 坐标边界处理
//!
//! 纬度截断到 `[-90, 90]`；经度按网格约定取模环绕，
//! 越过日界线的物质从另一侧重新进入，而不是堆积在边界上。

use crate::grid::{Grid, LonConvention};
use crate::particles::ParticleSet;

/// 边界处理器
#[derive(Debug, Clone, Copy)]
pub struct BoundaryEnforcer {
    convention: LonConvention,
}

impl BoundaryEnforcer {
    /// 使用网格的经度约定
    pub fn for_grid(grid: &Grid) -> Self {
        Self {
            convention: grid.convention(),
        }
    }

    /// 指定经度约定
    pub fn new(convention: LonConvention) -> Self {
        Self { convention }
    }

    /// 对单个坐标施加边界
    #[inline]
    pub fn apply(&self, lat: f64, lon: f64) -> (f64, f64) {
        (lat.clamp(-90.0, 90.0), self.convention.normalize(lon))
    }

    /// 对整个集合施加边界
    pub fn enforce(&self, mut particles: ParticleSet) -> ParticleSet {
        for p in particles.as_mut_slice() {
            (p.lat, p.lon) = self.apply(p.lat, p.lon);
        }
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Particle;

    #[test]
    fn test_latitude_clamped() {
        let b = BoundaryEnforcer::new(LonConvention::ZeroTo360);
        assert_eq!(b.apply(91.2, 10.0), (90.0, 10.0));
        assert_eq!(b.apply(-95.0, 10.0), (-90.0, 10.0));
    }

    #[test]
    fn test_antimeridian_wraps() {
        let b = BoundaryEnforcer::new(LonConvention::Signed180);
        let out = b.enforce(ParticleSet::from_particles(vec![
            Particle::new(0.0, 180.1, 1.0),
            Particle::new(0.0, -180.3, 1.0),
        ]));
        assert!((out.as_slice()[0].lon - (-179.9)).abs() < 1e-9);
        assert!((out.as_slice()[1].lon - 179.7).abs() < 1e-9);
    }

    #[test]
    fn test_zero_to_360_wraps() {
        let b = BoundaryEnforcer::new(LonConvention::ZeroTo360);
        let (_, lon) = b.apply(0.0, 360.5);
        assert!((lon - 0.5).abs() < 1e-9);
        let (_, lon) = b.apply(0.0, -0.5);
        assert!((lon - 359.5).abs() < 1e-9);
    }
}
