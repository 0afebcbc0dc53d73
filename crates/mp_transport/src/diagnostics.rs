// crates/mp_transport/src/diagnostics.rs

//! 质量守恒诊断
//!
//! 记录源网格总质量、播种粒子总权重和每个保存点的回落质量。
//! 这些值只用于观测：边界外丢弃造成的质量损失是预期行为，
//! 会被报告但不会被重新归一化。

use serde::{Deserialize, Serialize};

use crate::deposition::Deposition;

/// 单个保存点的质量记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavePointMass {
    /// 步数
    pub step: usize,
    /// 经过时间 [h]
    pub elapsed_hours: f64,
    /// 回落到网格的质量
    pub deposited_mass: f64,
    /// 落在包络外的粒子数
    pub dropped_particles: usize,
    /// 落在包络外的质量
    pub dropped_mass: f64,
}

/// 质量收支
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MassBudget {
    /// 源网格总质量
    pub source_mass: f64,
    /// 播种粒子总权重
    pub seeded_mass: f64,
    /// 各保存点记录（含最终回落）
    pub save_points: Vec<SavePointMass>,
}

impl MassBudget {
    /// 以源质量和播种质量创建
    pub fn new(source_mass: f64, seeded_mass: f64) -> Self {
        Self {
            source_mass,
            seeded_mass,
            save_points: Vec::new(),
        }
    }

    /// 记录一次回落
    pub fn record(&mut self, step: usize, elapsed_hours: f64, deposition: &Deposition) -> SavePointMass {
        let entry = SavePointMass {
            step,
            elapsed_hours,
            deposited_mass: deposition.deposited_mass,
            dropped_particles: deposition.dropped_particles,
            dropped_mass: deposition.dropped_mass,
        };
        // 最终回落与最后一个保存点同步时覆盖
        match self.save_points.last_mut() {
            Some(last) if last.step == step => *last = entry,
            _ => self.save_points.push(entry),
        }
        entry
    }

    /// 相对源质量的百分比，源质量为零时返回 `None`
    pub fn percent_of_source(&self, mass: f64) -> Option<f64> {
        (self.source_mass != 0.0).then(|| mass / self.source_mass * 100.0)
    }

    /// 播种守恒百分比
    pub fn seeding_percent(&self) -> Option<f64> {
        self.percent_of_source(self.seeded_mass)
    }

    /// 最终回落质量
    pub fn final_mass(&self) -> Option<f64> {
        self.save_points.last().map(|s| s.deposited_mass)
    }

    /// 最终守恒百分比
    pub fn final_percent(&self) -> Option<f64> {
        self.final_mass().and_then(|m| self.percent_of_source(m))
    }
}
