// crates/mp_transport/src/grid.rs

//! 规则经纬网格
//!
//! 浓度场与两个流速分量共享同一套 (lat, lon) 网格。构造时完成：
//!
//! 1. 非有限值（NaN/Inf）替换为 0（缺测视为"无物质 / 无流动"）
//! 2. 方向修正：形状恰为期望形状转置的场会被转置，其余不匹配为致命错误
//! 3. 坐标轴顺序规范化：严格递减的坐标轴被反转，场沿该轴翻转
//! 4. 经度约定检测：最小经度非负为 `[0, 360)`，否则为 `[-180, 180)`
//!
//! 构造完成后网格只读，可在工作线程间共享。
//!
//! 注意：当 `n_lat == n_lon` 时转置无法从形状上识别，按原样接受。

use mp_foundation::KahanSum;
use ndarray::{Array2, Axis as NdAxis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// 单点坐标轴的默认单元宽度 [°]
pub const SINGLE_CELL_SPACING: f64 = 0.25;

// ============================================================
// 坐标轴
// ============================================================

/// 严格递增的坐标轴
///
/// 单元 `i` 的覆盖范围为 `[lower_edge(i), upper_edge(i))`：
/// 内部边界取相邻坐标中点，首尾单元沿用最近一对坐标的间距。
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    values: Vec<f64>,
}

impl Axis {
    /// 从坐标值创建
    ///
    /// 返回坐标轴及是否经过反转。
    pub fn from_values(name: &'static str, mut values: Vec<f64>) -> TransportResult<(Self, bool)> {
        if values.is_empty() {
            return Err(TransportError::EmptyAxis { axis: name });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(TransportError::NonMonotonicAxis { axis: name, index });
        }

        let reversed = values.len() > 1 && values[1] < values[0];
        if reversed {
            values.reverse();
        }

        if let Some(w) = values.windows(2).position(|w| w[1] <= w[0]) {
            let index = if reversed { values.len() - 1 - w } else { w + 1 };
            return Err(TransportError::NonMonotonicAxis { axis: name, index });
        }

        Ok((Self { values }, reversed))
    }

    /// 坐标点数
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空（构造保证非空）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 坐标值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 第一个坐标
    #[inline]
    pub fn first(&self) -> f64 {
        self.values[0]
    }

    /// 最后一个坐标
    #[inline]
    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// 单元下边界
    pub fn lower_edge(&self, i: usize) -> f64 {
        let v = &self.values;
        match (v.len(), i) {
            (1, _) => v[0] - 0.5 * SINGLE_CELL_SPACING,
            (_, 0) => v[0] - 0.5 * (v[1] - v[0]),
            _ => 0.5 * (v[i - 1] + v[i]),
        }
    }

    /// 单元上边界
    pub fn upper_edge(&self, i: usize) -> f64 {
        let v = &self.values;
        let n = v.len();
        if n == 1 {
            v[0] + 0.5 * SINGLE_CELL_SPACING
        } else if i == n - 1 {
            v[n - 1] + 0.5 * (v[n - 1] - v[n - 2])
        } else {
            0.5 * (v[i] + v[i + 1])
        }
    }

    /// 包含 `value` 的单元（即最近坐标点）
    ///
    /// 超出 `[lower_edge(0), upper_edge(n-1))` 时返回 `None`。
    pub fn locate_cell(&self, value: f64) -> Option<usize> {
        let n = self.values.len();
        if !(value >= self.lower_edge(0) && value < self.upper_edge(n - 1)) {
            return None;
        }
        let k = self.values.partition_point(|&a| a <= value);
        if k == 0 {
            Some(0)
        } else if k == n {
            Some(n - 1)
        } else if value < 0.5 * (self.values[k - 1] + self.values[k]) {
            Some(k - 1)
        } else {
            Some(k)
        }
    }

    /// 有序查找的左插入点，超出最后一个坐标时返回 `None`
    pub fn locate_insertion(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let k = self.values.partition_point(|&a| a < value);
        (k < self.values.len()).then_some(k)
    }

    /// 线性插值区间：返回 `(i0, i1, t)`，`value = (1-t)·a[i0] + t·a[i1]`
    ///
    /// 仅在闭区间 `[first, last]` 内有定义，不外推。
    pub fn bracket(&self, value: f64) -> Option<(usize, usize, f64)> {
        let n = self.values.len();
        if !(value >= self.first() && value <= self.last()) {
            return None;
        }
        if n == 1 {
            return Some((0, 0, 0.0));
        }
        let k = self.values.partition_point(|&a| a <= value);
        let i0 = k.saturating_sub(1).min(n - 2);
        let t = (value - self.values[i0]) / (self.values[i0 + 1] - self.values[i0]);
        Some((i0, i0 + 1, t))
    }
}

// ============================================================
// 经度约定
// ============================================================

/// 经度约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LonConvention {
    /// `[0, 360)`
    ZeroTo360,
    /// `[-180, 180)`
    Signed180,
}

impl LonConvention {
    /// 按最小经度检测约定
    pub fn detect(min_lon: f64) -> Self {
        if min_lon >= 0.0 {
            Self::ZeroTo360
        } else {
            Self::Signed180
        }
    }

    /// 将经度取模映射到本约定的范围内（环绕而非截断）
    #[inline]
    pub fn normalize(&self, lon: f64) -> f64 {
        let offset = match self {
            Self::ZeroTo360 => 0.0,
            Self::Signed180 => 180.0,
        };
        let mut wrapped = (lon + offset).rem_euclid(360.0);
        // 极小负数取模会舍入到 360
        if wrapped >= 360.0 {
            wrapped -= 360.0;
        }
        wrapped - offset
    }

    /// 约定名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZeroTo360 => "[0, 360)",
            Self::Signed180 => "[-180, 180)",
        }
    }
}

// ============================================================
// 网格
// ============================================================

/// 浓度与流速网格快照
#[derive(Debug, Clone)]
pub struct Grid {
    lats: Axis,
    lons: Axis,
    concentration: Array2<f64>,
    u_current: Array2<f64>,
    v_current: Array2<f64>,
    convention: LonConvention,
    source_date: String,
}

impl Grid {
    /// 从原始坐标和场数组创建网格
    ///
    /// # 参数
    ///
    /// - `lats`, `lons`: 坐标轴 [°]，严格单调
    /// - `concentration`: 微塑料浓度
    /// - `u_current`: 东西向流速 [m/s]
    /// - `v_current`: 南北向流速 [m/s]
    ///
    /// # 错误
    ///
    /// 坐标轴为空或非严格单调、场形状修正后仍不匹配时返回错误。
    pub fn new(
        lats: Vec<f64>,
        lons: Vec<f64>,
        concentration: Array2<f64>,
        u_current: Array2<f64>,
        v_current: Array2<f64>,
    ) -> TransportResult<Self> {
        let (lats, flip_lat) = Axis::from_values("lat", lats)?;
        let (lons, flip_lon) = Axis::from_values("lon", lons)?;
        if flip_lat {
            debug!("纬度轴递减，已反转");
        }
        if flip_lon {
            debug!("经度轴递减，已反转");
        }

        let expected = (lats.len(), lons.len());
        let prepare = |name: &'static str, field: Array2<f64>| {
            let field = orient(name, field, expected)?;
            Ok::<_, TransportError>(normalize_field(field, flip_lat, flip_lon))
        };

        let concentration = prepare("mp_concentration", concentration)?;
        let u_current = prepare("u_current", u_current)?;
        let v_current = prepare("v_current", v_current)?;

        let convention = LonConvention::detect(lons.first());

        Ok(Self {
            lats,
            lons,
            concentration,
            u_current,
            v_current,
            convention,
            source_date: "unknown".to_string(),
        })
    }

    /// 设置来源日期标签
    pub fn with_source_date(mut self, date: impl Into<String>) -> Self {
        self.source_date = date.into();
        self
    }

    /// 纬度轴
    #[inline]
    pub fn lats(&self) -> &Axis {
        &self.lats
    }

    /// 经度轴
    #[inline]
    pub fn lons(&self) -> &Axis {
        &self.lons
    }

    /// 网格形状 (n_lat, n_lon)
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    /// 浓度场
    #[inline]
    pub fn concentration(&self) -> &Array2<f64> {
        &self.concentration
    }

    /// 东西向流速 [m/s]
    #[inline]
    pub fn u_current(&self) -> &Array2<f64> {
        &self.u_current
    }

    /// 南北向流速 [m/s]
    #[inline]
    pub fn v_current(&self) -> &Array2<f64> {
        &self.v_current
    }

    /// 经度约定
    #[inline]
    pub fn convention(&self) -> LonConvention {
        self.convention
    }

    /// 将经度映射到网格约定
    ///
    /// 所有处理坐标的组件都通过此函数规范化经度。
    #[inline]
    pub fn normalize_lon(&self, lon: f64) -> f64 {
        self.convention.normalize(lon)
    }

    /// 经度所在单元，按 360° 周期处理
    ///
    /// 首尾单元的边界可能跨过约定的接缝（如从 0° 起的 `[0, 360)` 网格，
    /// 首个单元西半部在 `[-0.5, 0)`），因此依次尝试 `lon`、`lon - 360`、
    /// `lon + 360` 三个周期像。
    #[inline]
    pub fn locate_lon_cell(&self, lon: f64) -> Option<usize> {
        [lon, lon - 360.0, lon + 360.0]
            .into_iter()
            .find_map(|l| self.lons.locate_cell(l))
    }

    /// 来源日期标签
    #[inline]
    pub fn source_date(&self) -> &str {
        &self.source_date
    }

    /// 浓度场总质量
    pub fn total_mass(&self) -> f64 {
        KahanSum::sum_iter(self.concentration.iter().copied())
    }

    /// 正浓度单元数
    pub fn positive_cells(&self) -> usize {
        self.concentration.iter().filter(|&&c| c > 0.0).count()
    }
}

/// 检查并修正场的方向
fn orient(
    name: &'static str,
    field: Array2<f64>,
    expected: (usize, usize),
) -> TransportResult<Array2<f64>> {
    let actual = field.dim();
    if actual == expected {
        Ok(field)
    } else if actual == (expected.1, expected.0) {
        debug!("场 {} 形状为 {:?}，已转置", name, actual);
        Ok(field.reversed_axes())
    } else {
        Err(TransportError::ShapeMismatch {
            field: name,
            expected,
            actual,
        })
    }
}

/// 缺测置零，并按坐标轴反转情况翻转，输出标准行主序
fn normalize_field(mut field: Array2<f64>, flip_lat: bool, flip_lon: bool) -> Array2<f64> {
    field.mapv_inplace(|x| if x.is_finite() { x } else { 0.0 });
    if flip_lat {
        field.invert_axis(NdAxis(0));
    }
    if flip_lon {
        field.invert_axis(NdAxis(1));
    }
    field.as_standard_layout().into_owned()
}
