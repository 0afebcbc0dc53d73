// crates/mp_io/src/input.rs

//! 输入网格快照
//!
//! JSON 格式，二维数组按行嵌套，`null` 表示缺测：
//!
//! ```json
//! {
//!   "date": "2024-05-01",
//!   "lat": [30.0, 30.5],
//!   "lon": [140.0, 140.5, 141.0],
//!   "mp_concentration": [[0.0, 1.2, null], [0.4, 0.0, 2.0]],
//!   "u_current": [[0.1, 0.1, 0.1], [0.1, 0.1, 0.1]],
//!   "v_current": [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]
//! }
//! ```
//!
//! 缺测值读入为 NaN，构建 [`Grid`] 时统一置零。

use mp_transport::{Grid, VelocityField};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{IoError, IoResult};

/// 原始输入快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInput {
    /// 来源日期标签
    #[serde(default = "default_date")]
    pub date: String,
    /// 纬度 [°]
    pub lat: Vec<f64>,
    /// 经度 [°]
    pub lon: Vec<f64>,
    /// 微塑料浓度
    pub mp_concentration: Vec<Vec<Option<f64>>>,
    /// 东西向流速 [m/s]
    pub u_current: Vec<Vec<Option<f64>>>,
    /// 南北向流速 [m/s]
    pub v_current: Vec<Vec<Option<f64>>>,
}

fn default_date() -> String {
    "unknown".to_string()
}

impl GridInput {
    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IoError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(content: &str) -> IoResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// 转换为规范化网格
    pub fn into_grid(self) -> IoResult<Grid> {
        let concentration = to_array("mp_concentration", &self.mp_concentration)?;
        let u_current = to_array("u_current", &self.u_current)?;
        let v_current = to_array("v_current", &self.v_current)?;
        let grid = Grid::new(self.lat, self.lon, concentration, u_current, v_current)?
            .with_source_date(self.date);
        Ok(grid)
    }
}

/// 加载输入文件并构建网格
pub fn load_grid<P: AsRef<Path>>(path: P) -> IoResult<Grid> {
    let path = path.as_ref();
    let grid = GridInput::load(path)?.into_grid()?;
    let (n_lat, n_lon) = grid.shape();
    info!(
        "读取输入 {}: 网格 {}x{}, 日期 {}",
        path.display(),
        n_lat,
        n_lon,
        grid.source_date()
    );
    Ok(grid)
}

/// 嵌套行转为二维数组，`None` 记为 NaN
fn to_array(variable: &'static str, rows: &[Vec<Option<f64>>]) -> IoResult<Array2<f64>> {
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * n_cols);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != n_cols {
            return Err(IoError::RaggedRows {
                variable,
                row,
                expected: n_cols,
                actual: values.len(),
            });
        }
        flat.extend(values.iter().map(|v| v.unwrap_or(f64::NAN)));
    }
    Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|e| IoError::InconsistentDataset(format!("{variable}: {e}")))
}

// ============================================================
// 概要
// ============================================================

/// 网格概要，用于命令行展示和检查
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    /// 来源日期
    pub date: String,
    /// 形状 (n_lat, n_lon)
    pub shape: (usize, usize),
    /// 纬度范围
    pub lat_range: (f64, f64),
    /// 经度范围
    pub lon_range: (f64, f64),
    /// 经度约定
    pub convention: String,
    /// 总质量
    pub total_mass: f64,
    /// 正值单元数
    pub positive_cells: usize,
    /// 最大浓度
    pub max_concentration: f64,
    /// 最大流速 [m/s]
    pub max_speed: f64,
}

impl GridSummary {
    /// 从网格统计
    pub fn from_grid(grid: &Grid) -> Self {
        Self {
            date: grid.source_date().to_string(),
            shape: grid.shape(),
            lat_range: (grid.lats().first(), grid.lats().last()),
            lon_range: (grid.lons().first(), grid.lons().last()),
            convention: grid.convention().name().to_string(),
            total_mass: grid.total_mass(),
            positive_cells: grid.positive_cells(),
            max_concentration: grid.concentration().iter().copied().fold(0.0, f64::max),
            max_speed: VelocityField::new(grid).max_speed(),
        }
    }

    /// 浓度是否全为零
    pub fn is_empty(&self) -> bool {
        self.positive_cells == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "date": "2024-05-01",
        "lat": [30.0, 30.5],
        "lon": [140.0, 140.5, 141.0],
        "mp_concentration": [[0.0, 1.2, null], [0.4, 0.0, 2.0]],
        "u_current": [[0.1, 0.1, 0.1], [0.1, null, 0.1]],
        "v_current": [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]
    }"#;

    #[test]
    fn test_parse_and_build_grid() {
        let grid = GridInput::from_json(SAMPLE).unwrap().into_grid().unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.source_date(), "2024-05-01");
        assert_eq!(grid.concentration()[[0, 2]], 0.0);
        assert_eq!(grid.u_current()[[1, 1]], 0.0);
        assert!((grid.total_mass() - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_missing_date_defaults() {
        let input = GridInput::from_json(
            r#"{ "lat": [0.0], "lon": [0.0], "mp_concentration": [[1.0]],
                 "u_current": [[0.0]], "v_current": [[0.0]] }"#,
        )
        .unwrap();
        assert_eq!(input.date, "unknown");
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let mut input = GridInput::from_json(SAMPLE).unwrap();
        input.v_current[1].pop();
        let err = input.into_grid().unwrap_err();
        assert!(matches!(err, IoError::RaggedRows { variable: "v_current", row: 1, .. }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut input = GridInput::from_json(SAMPLE).unwrap();
        input.lat.push(31.0);
        assert!(matches!(input.into_grid(), Err(IoError::Grid(_))));
    }

    #[test]
    fn test_summary() {
        let grid = GridInput::from_json(SAMPLE).unwrap().into_grid().unwrap();
        let summary = GridSummary::from_grid(&grid);
        assert_eq!(summary.positive_cells, 3);
        assert_eq!(summary.max_concentration, 2.0);
        assert_eq!(summary.convention, "[0, 360)");
        assert!(!summary.is_empty());
    }
}
