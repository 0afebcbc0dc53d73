// crates/mp_foundation/src/numerics/kahan_sum.rs

//! Kahan 求和算法
//!
//! 质量收支诊断需要对上百万个粒子权重累加，朴素求和的舍入误差
//! 会直接表现为虚假的"质量损失"。

/// Kahan 补偿求和器
///
/// # 示例
///
/// ```rust
/// use mp_foundation::numerics::KahanSum;
///
/// let total = KahanSum::sum_iter(vec![0.1; 10]);
/// assert!((total - 1.0).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 合并另一个求和器（用于并行归约）
    #[inline]
    pub fn merge(mut self, other: Self) -> Self {
        self.add(other.sum);
        self.add(-other.compensation);
        self
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }

    /// 从迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = f64>>(iter: I) -> f64 {
        let mut kahan = Self::new();
        for v in iter {
            kahan.add(v);
        }
        kahan.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kahan_sum_small_increments() {
        let data = vec![0.1f64; 1000];
        let sum = KahanSum::sum_iter(data.iter().cloned());
        assert!((sum - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_kahan_merge() {
        let mut a = KahanSum::new();
        let mut b = KahanSum::new();
        for _ in 0..500 {
            a.add(0.1);
            b.add(0.1);
        }
        assert!((a.merge(b).value() - 100.0).abs() < 1e-12);
    }
}
