// crates/mp_io/src/output.rs

//! 预报数据集
//!
//! 把 [`Forecast`] 整理成带坐标的 `(time, lat, lon)` 数据集，
//! 附带方法、来源日期、质量收支和截断报告等元数据，以 JSON 保存。

use chrono::{DateTime, Utc};
use mp_config::ForecastConfig;
use mp_transport::{CapSummary, Forecast, MassBudget};
use ndarray::{stack, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::{IoError, IoResult};

/// 时间单位标签
pub const TIME_UNITS: &str = "hours since start";

// ============================================================
// 元数据
// ============================================================

/// 数据集元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetadata {
    /// 描述
    pub description: String,
    /// 预报方法
    pub forecast_method: String,
    /// 来源日期
    pub source_date: String,
    /// 时间单位
    pub time_units: String,
    /// 预报时长 [h]
    pub forecast_duration_hours: f64,
    /// 创建时间 (UTC)
    pub created_at: DateTime<Utc>,
    /// 粒子数
    pub particle_count: usize,
    /// 随机数基准种子
    pub seed: u64,
    /// 质量收支
    pub mass_budget: MassBudget,
    /// 截断报告
    #[serde(default)]
    pub cap: Option<CapSummary>,
    /// 运行配置
    #[serde(default)]
    pub config: Option<ForecastConfig>,
}

// ============================================================
// 数据集
// ============================================================

/// 预报数据集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDataset {
    /// 时刻 [h]
    pub time: Vec<f64>,
    /// 纬度 [°]
    pub lat: Vec<f64>,
    /// 经度 [°]
    pub lon: Vec<f64>,
    /// 浓度 (time, lat, lon)
    pub mp_concentration: Array3<f64>,
    /// 元数据
    pub metadata: ForecastMetadata,
}

impl ForecastDataset {
    /// 从预报结果构建
    pub fn from_forecast(forecast: &Forecast) -> IoResult<Self> {
        let views: Vec<ArrayView2<'_, f64>> =
            forecast.snapshots.iter().map(|s| s.concentration.view()).collect();
        if views.is_empty() {
            return Err(IoError::InconsistentDataset("预报不含任何快照".to_string()));
        }
        let mp_concentration = stack(Axis(0), &views)
            .map_err(|e| IoError::InconsistentDataset(format!("快照形状不一致: {e}")))?;

        let metadata = ForecastMetadata {
            description: format!("Microplastic forecast from {}", forecast.source_date),
            forecast_method: forecast.method.clone(),
            source_date: forecast.source_date.clone(),
            time_units: TIME_UNITS.to_string(),
            forecast_duration_hours: forecast.duration_hours,
            created_at: Utc::now(),
            particle_count: forecast.particle_count,
            seed: forecast.seed,
            mass_budget: forecast.budget.clone(),
            cap: forecast.cap,
            config: None,
        };

        let dataset = Self {
            time: forecast.times(),
            lat: forecast.lats.clone(),
            lon: forecast.lons.clone(),
            mp_concentration,
            metadata,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// 记录运行配置
    pub fn with_config(mut self, config: &ForecastConfig) -> Self {
        self.metadata.config = Some(config.clone());
        self
    }

    /// 检查坐标与数组形状一致
    pub fn validate(&self) -> IoResult<()> {
        let expected = (self.time.len(), self.lat.len(), self.lon.len());
        if self.mp_concentration.dim() != expected {
            return Err(IoError::InconsistentDataset(format!(
                "浓度数组形状 {:?} 与坐标 {:?} 不一致",
                self.mp_concentration.dim(),
                expected
            )));
        }
        if self.time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(IoError::InconsistentDataset("时间轴非严格递增".to_string()));
        }
        Ok(())
    }

    /// 时刻数
    #[inline]
    pub fn n_times(&self) -> usize {
        self.time.len()
    }

    /// 第 `t` 个时刻的浓度场
    pub fn snapshot(&self, t: usize) -> Option<ArrayView2<'_, f64>> {
        (t < self.n_times()).then(|| self.mp_concentration.index_axis(Axis(0), t))
    }

    /// 最后时刻的浓度场
    pub fn last_snapshot(&self) -> Option<ArrayView2<'_, f64>> {
        self.n_times().checked_sub(1).and_then(|t| self.snapshot(t))
    }

    /// 保存为 JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!("写入预报数据集 {}: {} 个时刻", path.display(), self.n_times());
        Ok(())
    }

    /// 从 JSON 加载
    pub fn load<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IoError::FileNotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let dataset: Self = serde_json::from_reader(reader)?;
        dataset.validate()?;
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_transport::{run_forecast, Grid};
    use ndarray::Array2;

    fn forecast() -> Forecast {
        let mut c = Array2::zeros((2, 3));
        c[[0, 1]] = 2.0;
        c[[1, 2]] = 1.0;
        let grid = Grid::new(
            vec![10.0, 11.0],
            vec![20.0, 21.0, 22.0],
            c,
            Array2::from_elem((2, 3), 0.05),
            Array2::zeros((2, 3)),
        )
        .unwrap()
        .with_source_date("2024-05-01");
        let config = ForecastConfig {
            n_steps: 6,
            save_interval: 2,
            seed: Some(3),
            ..ForecastConfig::default()
        };
        run_forecast(&grid, &config).unwrap()
    }

    #[test]
    fn test_from_forecast() {
        let forecast = forecast();
        let dataset = ForecastDataset::from_forecast(&forecast).unwrap();
        assert_eq!(dataset.mp_concentration.dim(), (4, 2, 3));
        assert_eq!(dataset.time, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(dataset.metadata.description, "Microplastic forecast from 2024-05-01");
        assert_eq!(dataset.metadata.forecast_method, "Lagrangian particle tracking (RK4)");
        assert_eq!(dataset.metadata.time_units, TIME_UNITS);
        assert_eq!(dataset.metadata.forecast_duration_hours, 6.0);
        assert_eq!(dataset.last_snapshot().unwrap(), forecast.final_concentration.view());
        assert!(dataset.snapshot(4).is_none());
    }

    #[test]
    fn test_validate_detects_mismatch() {
        let mut dataset = ForecastDataset::from_forecast(&forecast()).unwrap();
        dataset.time.pop();
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_save_load() {
        let temp_dir = std::env::temp_dir();
        let path = temp_dir.join("mp_io_test_forecast_dataset.json");
        let config = ForecastConfig::default();
        let dataset = ForecastDataset::from_forecast(&forecast())
            .unwrap()
            .with_config(&config);
        dataset.save(&path).unwrap();

        let loaded = ForecastDataset::load(&path).unwrap();
        assert_eq!(loaded.time, dataset.time);
        assert_eq!(loaded.metadata.config, Some(config));
        assert_eq!(loaded.metadata.created_at, dataset.metadata.created_at);
        assert_eq!(loaded.mp_concentration.dim(), dataset.mp_concentration.dim());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ForecastDataset::load("/definitely/not/here.json");
        assert!(matches!(result, Err(IoError::FileNotFound(_))));
    }
}
