// crates/mp_transport/src/rng.rs

//! 确定性随机数子流
//!
//! 密钥只由基准种子决定，(时间步, 粒子块) 编码在 64 位流编号中：
//! 高 32 位为 `step + 1`，低 32 位为粒子块序号，流 0 留给播种。
//! 相邻种子的密钥互不相关，不会复用彼此的随机数。
//!
//! 粒子块大小固定，与线程数无关，因此串行和并行执行得到完全相同的结果。

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// 每个随机子流覆盖的粒子数
pub const PARTICLE_CHUNK: usize = 4096;

/// 随机子流工厂
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStreams {
    base_seed: u64,
}

impl RngStreams {
    /// 从基准种子创建
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// 从系统熵源抽取基准种子
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// 基准种子
    #[inline]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// 粒子播种使用的生成器（流 0）
    pub fn seeding(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.base_seed)
    }

    /// 第 `step` 步、第 `chunk` 个粒子块使用的生成器
    pub fn stream(&self, step: u64, chunk: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.base_seed);
        rng.set_stream(stream_id(step, chunk));
        rng
    }
}

/// 流编号：高 32 位 `step + 1`，低 32 位粒子块
#[inline]
fn stream_id(step: u64, chunk: u64) -> u64 {
    (step.wrapping_add(1) << 32) | (chunk & 0xFFFF_FFFF)
}
