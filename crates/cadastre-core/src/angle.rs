//! 角度值

use crate::math::{normalize_bearing, TINY};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 以弧度表示的角度（不可变）
///
/// 相等比较使用 [`TINY`] 容差，不做精确浮点比较。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RadianValue(f64);

impl RadianValue {
    pub const ZERO: RadianValue = RadianValue(0.0);

    pub fn new(radians: f64) -> Self {
        Self(radians)
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self(degrees.to_radians())
    }

    pub fn radians(&self) -> f64 {
        self.0
    }

    pub fn degrees(&self) -> f64 {
        self.0.to_degrees()
    }

    /// 规范化到 [0, 2π)
    pub fn normalized(&self) -> Self {
        Self(normalize_bearing(self.0))
    }

    /// 从十进制弧度字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<f64>().ok().map(Self)
    }
}

impl PartialEq for RadianValue {
    fn eq(&self, other: &Self) -> bool {
        (self.0 - other.0).abs() < TINY
    }
}

impl fmt::Display for RadianValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for RadianValue {
    fn from(radians: f64) -> Self {
        Self(radians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_tolerance_equality() {
        assert_eq!(RadianValue::new(1.0), RadianValue::new(1.0 + TINY / 2.0));
        assert_ne!(RadianValue::new(1.0), RadianValue::new(1.0 + TINY * 2.0));
    }

    #[test]
    fn test_parse_and_display() {
        let a = RadianValue::new(PI / 3.0);
        let parsed = RadianValue::parse(&a.to_string()).unwrap();
        assert_eq!(parsed, a);
        assert!(RadianValue::parse("north").is_none());
    }

    #[test]
    fn test_normalized() {
        let a = RadianValue::from_degrees(-90.0).normalized();
        assert!((a.degrees() - 270.0).abs() < 1e-9);
    }
}
