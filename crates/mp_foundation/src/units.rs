// crates/mp_foundation/src/units.rs

//! 时间单位换算

/// 每小时秒数
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// 小时换算为秒
#[inline]
pub fn hours_to_seconds(hours: f64) -> f64 {
    hours * SECONDS_PER_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_to_seconds() {
        assert_eq!(hours_to_seconds(1.0), 3600.0);
        assert_eq!(hours_to_seconds(0.5), 1800.0);
    }
}
