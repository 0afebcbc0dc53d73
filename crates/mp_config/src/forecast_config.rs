// crates/mp_config/src/forecast_config.rs

//! ForecastConfig - 漂移预报运行配置
//!
//! 扁平的参数表，每个字段都有默认值，可从 JSON 文件加载，
//! 缺省字段回退到默认值。

use mp_foundation::units::hours_to_seconds;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 粒子回落到网格时的单元归属规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepositionRule {
    /// 包含粒子坐标的单元（最近轴坐标）
    #[default]
    Nearest,
    /// 有序查找的左插入点（旧版行为，带半格偏移）
    LeftInsertion,
}

impl DepositionRule {
    /// 规则名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::LeftInsertion => "left_insertion",
        }
    }
}

impl std::str::FromStr for DepositionRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "left_insertion" | "left-insertion" => Ok(Self::LeftInsertion),
            other => Err(ConfigError::invalid(
                "deposition",
                other,
                "可选值: nearest, left_insertion",
            )),
        }
    }
}

/// 漂移预报配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// 每个正浓度单元释放的粒子数
    #[serde(default = "default_particles_per_cell")]
    pub particles_per_cell: usize,

    /// 时间步长 [h]
    #[serde(default = "default_dt_hours")]
    pub dt_hours: f64,

    /// 时间步数
    #[serde(default = "default_n_steps")]
    pub n_steps: usize,

    /// 水平扩散系数 K_h [m²/s]
    #[serde(default = "default_diffusivity")]
    pub diffusivity: f64,

    /// 离群值截断百分位，`None` 表示不截断
    #[serde(default = "default_cap_percentile")]
    pub cap_percentile: Option<f64>,

    /// 快照间隔 [步]
    #[serde(default = "default_save_interval")]
    pub save_interval: usize,

    /// 进度日志间隔 [步]，0 表示关闭
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// 随机数基准种子
    #[serde(default)]
    pub seed: Option<u64>,

    /// 单元归属规则
    #[serde(default)]
    pub deposition: DepositionRule,

    /// 低于该粒子数时串行执行
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_particles_per_cell() -> usize { 10 }
fn default_dt_hours() -> f64 { 1.0 }
fn default_n_steps() -> usize { 24 * 30 }
fn default_diffusivity() -> f64 { 10.0 }
fn default_cap_percentile() -> Option<f64> { Some(99.0) }
fn default_save_interval() -> usize { 24 }
fn default_progress_interval() -> usize { 6 }
fn default_parallel_threshold() -> usize { 2000 }

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            particles_per_cell: default_particles_per_cell(),
            dt_hours: default_dt_hours(),
            n_steps: default_n_steps(),
            diffusivity: default_diffusivity(),
            cap_percentile: default_cap_percentile(),
            save_interval: default_save_interval(),
            progress_interval: default_progress_interval(),
            seed: None,
            deposition: DepositionRule::default(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl ForecastConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ForecastConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particles_per_cell == 0 {
            return Err(ConfigError::invalid(
                "particles_per_cell",
                self.particles_per_cell,
                "每个单元至少释放 1 个粒子",
            ));
        }

        if !(self.dt_hours.is_finite() && self.dt_hours > 0.0) {
            return Err(ConfigError::invalid("dt_hours", self.dt_hours, "时间步长必须为正的有限值"));
        }

        if !(self.diffusivity.is_finite() && self.diffusivity >= 0.0) {
            return Err(ConfigError::invalid(
                "diffusivity",
                self.diffusivity,
                "扩散系数必须为非负有限值",
            ));
        }

        if let Some(p) = self.cap_percentile {
            if !(p > 0.0 && p < 100.0) {
                return Err(ConfigError::invalid("cap_percentile", p, "百分位必须在 (0, 100) 范围内"));
            }
        }

        if self.save_interval == 0 {
            return Err(ConfigError::invalid(
                "save_interval",
                self.save_interval,
                "快照间隔至少为 1 步",
            ));
        }

        Ok(())
    }

    /// 时间步长 [s]
    #[inline]
    pub fn dt_seconds(&self) -> f64 {
        hours_to_seconds(self.dt_hours)
    }

    /// 总预报时长 [h]
    #[inline]
    pub fn total_hours(&self) -> f64 {
        self.n_steps as f64 * self.dt_hours
    }
}
