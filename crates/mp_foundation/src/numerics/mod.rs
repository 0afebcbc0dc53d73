// crates/mp_foundation/src/numerics/mod.rs

//! 数值工具

pub mod kahan_sum;

pub use kahan_sum::KahanSum;
