// crates/mp_transport/src/velocity.rs

//! 连续流速场
//!
//! 在两个流速分量网格上做双线性插值：
//! - 查询经度先按网格约定规范化，跨日界线的粒子能正确查到流速
//! - 网格包络外返回零流速（不外推）
//! - 角速度换算带极区保护，见 [`crate::units::angular_rate`]

use ndarray::Array2;
use rayon::prelude::*;

use crate::grid::Grid;
use crate::units;

/// 只读流速场，可在线程间共享
#[derive(Debug, Clone, Copy)]
pub struct VelocityField<'g> {
    grid: &'g Grid,
}

impl<'g> VelocityField<'g> {
    /// 基于网格创建流速场
    pub fn new(grid: &'g Grid) -> Self {
        Self { grid }
    }

    /// 底层网格
    #[inline]
    pub fn grid(&self) -> &'g Grid {
        self.grid
    }

    /// 单点物理流速 (u, v) [m/s]
    #[inline]
    pub fn velocity_at(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lon = self.grid.normalize_lon(lon);
        let (Some(bi), Some(bj)) = (self.grid.lats().bracket(lat), self.grid.lons().bracket(lon))
        else {
            return (0.0, 0.0);
        };
        (
            bilinear(self.grid.u_current(), bi, bj),
            bilinear(self.grid.v_current(), bi, bj),
        )
    }

    /// 单点角速度 (dlat/dt, dlon/dt) [°/s]
    #[inline]
    pub fn angular_rate(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (u, v) = self.velocity_at(lat, lon);
        units::angular_rate(lat, u, v)
    }

    /// 批量查询物理流速
    pub fn sample(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points
            .par_iter()
            .map(|&(lat, lon)| self.velocity_at(lat, lon))
            .collect()
    }

    /// 最大流速模 [m/s]
    pub fn max_speed(&self) -> f64 {
        self.grid
            .u_current()
            .iter()
            .zip(self.grid.v_current().iter())
            .map(|(u, v)| u.hypot(*v))
            .fold(0.0, f64::max)
    }
}

#[inline]
fn bilinear(field: &Array2<f64>, bi: (usize, usize, f64), bj: (usize, usize, f64)) -> f64 {
    let (i0, i1, ty) = bi;
    let (j0, j1, tx) = bj;
    let f00 = field[[i0, j0]];
    let f01 = field[[i0, j1]];
    let f10 = field[[i1, j0]];
    let f11 = field[[i1, j1]];
    (1.0 - ty) * ((1.0 - tx) * f00 + tx * f01) + ty * ((1.0 - tx) * f10 + tx * f11)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_grid(lons: Vec<f64>) -> Grid {
        let lats = vec![-1.0, 0.0, 1.0];
        let (n_lat, n_lon) = (lats.len(), lons.len());
        let u = Array2::from_shape_fn((n_lat, n_lon), |(i, j)| lats[i] + 2.0 * lons[j]);
        let v = Array2::from_elem((n_lat, n_lon), 0.5);
        Grid::new(lats.clone(), lons, Array2::zeros((n_lat, n_lon)), u, v).unwrap()
    }

    #[test]
    fn test_bilinear_reproduces_linear_field() {
        let grid = linear_grid(vec![10.0, 11.0, 12.0]);
        let field = VelocityField::new(&grid);
        let (u, v) = field.velocity_at(0.25, 11.5);
        assert!((u - (0.25 + 23.0)).abs() < 1e-12);
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_outside_envelope_is_zero() {
        let grid = linear_grid(vec![10.0, 11.0, 12.0]);
        let field = VelocityField::new(&grid);
        assert_eq!(field.velocity_at(1.5, 11.0), (0.0, 0.0));
        assert_eq!(field.velocity_at(0.0, 12.5), (0.0, 0.0));
        assert_eq!(field.angular_rate(1.5, 11.0), (0.0, 0.0));
    }

    #[test]
    fn test_query_longitude_is_normalized() {
        let grid = linear_grid(vec![-171.0, -170.0, -169.0]);
        let field = VelocityField::new(&grid);
        let (direct, _) = field.velocity_at(0.0, -170.0);
        let (wrapped, _) = field.velocity_at(0.0, 190.0);
        assert!((direct - wrapped).abs() < 1e-9);
        assert!(direct != 0.0);
    }

    #[test]
    fn test_batch_matches_single() {
        let grid = linear_grid(vec![10.0, 11.0, 12.0]);
        let field = VelocityField::new(&grid);
        let points = vec![(0.1, 10.2), (-0.7, 11.9), (5.0, 5.0)];
        let batch = field.sample(&points);
        for (p, s) in points.iter().zip(&batch) {
            assert_eq!(field.velocity_at(p.0, p.1), *s);
        }
    }

    #[test]
    fn test_angular_rate_converts_units() {
        let lats = vec![-1.0, 1.0];
        let lons = vec![0.0, 1.0];
        let grid = Grid::new(
            lats,
            lons,
            Array2::zeros((2, 2)),
            Array2::from_elem((2, 2), 1.11),
            Array2::from_elem((2, 2), 2.22),
        )
        .unwrap();
        let field = VelocityField::new(&grid);
        let (dlat, dlon) = field.angular_rate(0.0, 0.5);
        assert!((dlat - 2.0e-5).abs() < 1e-15);
        assert!((dlon - 1.0e-5).abs() < 1e-15);
        assert!((field.max_speed() - 1.11f64.hypot(2.22)).abs() < 1e-12);
    }
}
