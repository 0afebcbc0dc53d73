// crates/mp_transport/src/units.rs

//! 球面坐标与物理单位换算

/// 每度纬度对应的米数（球面近似）
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// 计算经向缩放时使用的最大纬度绝对值 [°]
///
/// `cos(lat)` 在 ±90° 处为零，经度角速度会发散。
pub const POLE_GUARD_LATITUDE: f64 = 89.5;

/// 经线收敛因子 `cos(lat)`，纬度先截断到 [`POLE_GUARD_LATITUDE`]
#[inline]
pub fn meridian_scale(lat_deg: f64) -> f64 {
    lat_deg
        .clamp(-POLE_GUARD_LATITUDE, POLE_GUARD_LATITUDE)
        .to_radians()
        .cos()
}

/// 将物理速度 (u, v) [m/s] 换算为角速度 (dlat/dt, dlon/dt) [°/s]
#[inline]
pub fn angular_rate(lat_deg: f64, u: f64, v: f64) -> (f64, f64) {
    let dlat_dt = v / METERS_PER_DEGREE;
    let dlon_dt = u / (METERS_PER_DEGREE * meridian_scale(lat_deg));
    (dlat_dt, dlon_dt)
}
