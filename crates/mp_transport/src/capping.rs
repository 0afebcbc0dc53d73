// crates/mp_transport/src/capping.rs

//! 百分位离群值截断
//!
//! 只在严格为正的单元上统计百分位（零值不参与分布），
//! 然后把浓度截断到 `[0, cap]`。百分位采用最近秩线性插值：
//! `rank = p/100 · (n-1)`。
//!
//! 对整个预报序列，截断值取自**最终**快照并统一施加到每个快照，
//! 保证序列内阈值一致。

use mp_foundation::KahanSum;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// 截断报告
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapSummary {
    /// 使用的百分位
    pub percentile: f64,
    /// 截断阈值，无正值单元时为 0
    pub cap_value: f64,
    /// 参与统计的正值单元数
    pub positive_cells: usize,
    /// 原值超过阈值的单元数
    pub n_capped: usize,
    /// 截断前最大值
    pub original_max: f64,
    /// 截断前总质量
    pub original_mass: f64,
    /// 截断移除的质量
    pub mass_removed: f64,
}

impl CapSummary {
    /// 是否存在可统计的正值单元
    #[inline]
    pub fn has_threshold(&self) -> bool {
        self.positive_cells > 0
    }

    /// 移除质量占截断前总质量的百分比
    pub fn removed_percent(&self) -> Option<f64> {
        (self.original_mass > 0.0).then(|| self.mass_removed / self.original_mass * 100.0)
    }
}

/// 百分位截断器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierCapper {
    percentile: f64,
}

impl OutlierCapper {
    /// 创建截断器，`percentile` 必须在 (0, 100) 内
    pub fn new(percentile: f64) -> TransportResult<Self> {
        if !(percentile > 0.0 && percentile < 100.0) {
            return Err(TransportError::InvalidPercentile(percentile));
        }
        Ok(Self { percentile })
    }

    /// 百分位
    #[inline]
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// 截断单个快照
    ///
    /// 无正值单元时原样返回，阈值为 0。
    pub fn cap(&self, field: &Array2<f64>) -> (Array2<f64>, CapSummary) {
        let mut positive: Vec<f64> = field.iter().copied().filter(|&c| c > 0.0).collect();
        let original_max = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let original_mass = KahanSum::sum_iter(field.iter().copied());

        let Some(cap_value) = percentile_of(&mut positive, self.percentile) else {
            return (
                field.clone(),
                CapSummary {
                    percentile: self.percentile,
                    cap_value: 0.0,
                    positive_cells: 0,
                    n_capped: 0,
                    original_max,
                    original_mass,
                    mass_removed: 0.0,
                },
            );
        };

        let n_capped = positive.iter().filter(|&&c| c > cap_value).count();
        let mut capped = field.clone();
        apply_cap(&mut capped, cap_value);
        let mass_removed = original_mass - KahanSum::sum_iter(capped.iter().copied());

        (
            capped,
            CapSummary {
                percentile: self.percentile,
                cap_value,
                positive_cells: positive.len(),
                n_capped,
                original_max,
                original_mass,
                mass_removed,
            },
        )
    }
}

/// 把场截断到 `[0, cap_value]`
pub fn apply_cap(field: &mut Array2<f64>, cap_value: f64) {
    let cap_value = cap_value.max(0.0);
    field.mapv_inplace(|c| c.clamp(0.0, cap_value));
}

/// 线性插值百分位，输入为空时返回 `None`（会对输入排序）
pub fn percentile_of(values: &mut [f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let rank = percentile / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil().min((values.len() - 1) as f64) as usize;
    let frac = rank - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}
