//! 距离观测值

use super::FeatureReferences;
use crate::feature::{FeatureId, FeatureStore};
use crate::geometry::{polar, SpatialSystem};
use crate::math::{to_microns, Point2, TINY};
use crate::operation::OperationId;
use crate::units::{DistanceUnit, UnitTable};
use std::fmt;

/// 观测距离
///
/// 内部以米存储，同时记录输入单位。输入单位为空表示"未定义"
/// （例如解析失败的结果）。
#[derive(Debug, Clone, Default)]
pub struct Distance {
    entered_unit: Option<DistanceUnit>,
    metric: f64,
    /// 固定值，下游的平差计算不得调整
    fixed: bool,
    /// 注记是否翻转到线的另一侧
    annotation_flipped: bool,
}

impl Distance {
    /// 以指定单位创建距离
    pub fn new(value: f64, unit: DistanceUnit) -> Self {
        Self {
            entered_unit: Some(unit),
            metric: unit.to_metric(value),
            fixed: false,
            annotation_flipped: false,
        }
    }

    /// 未定义的距离
    pub fn undefined() -> Self {
        Self::default()
    }

    /// 解析距离字符串，例如 `"123.45"`、`"100ft"`、`"3.5 ch"`
    ///
    /// 解析失败时返回未定义的距离，不报错。
    pub fn parse(text: &str, default_unit: DistanceUnit, units: &UnitTable) -> Self {
        let s = text.trim();
        if s.is_empty() {
            return Self::undefined();
        }

        let (num, abbrev) = split_distance_string(s);

        let value = match num.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return Self::undefined(),
        };

        let unit = if abbrev.is_empty() {
            Some(default_unit)
        } else {
            units.lookup(abbrev)
        };

        match unit {
            Some(unit) => Self::new(value, unit),
            None => Self::undefined(),
        }
    }

    /// 解析距离，失败时返回 `None`
    pub fn try_parse(text: &str, default_unit: DistanceUnit, units: &UnitTable) -> Option<Self> {
        let d = Self::parse(text, default_unit, units);
        d.is_defined().then_some(d)
    }

    pub fn is_defined(&self) -> bool {
        self.entered_unit.is_some()
    }

    pub fn entry_unit(&self) -> Option<DistanceUnit> {
        self.entered_unit
    }

    pub fn meters(&self) -> f64 {
        self.metric
    }

    pub fn microns(&self) -> i64 {
        to_microns(self.metric)
    }

    /// 以输入单位表示的观测值（未定义时为 0）
    pub fn observed_value(&self) -> f64 {
        self.entered_unit
            .map(|u| u.from_metric(self.metric))
            .unwrap_or(0.0)
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self) {
        self.fixed = true;
    }

    pub fn is_annotation_flipped(&self) -> bool {
        self.annotation_flipped
    }

    pub fn set_annotation_flipped(&mut self, flipped: bool) {
        self.annotation_flipped = flipped;
    }

    /// 按输入单位格式化；未定义时返回空串
    pub fn format(&self, append_abbrev: bool) -> String {
        match self.entered_unit {
            Some(unit) => unit.format(self.metric, append_abbrev),
            None => String::new(),
        }
    }

    pub fn format_in(&self, unit: DistanceUnit, append_abbrev: bool) -> String {
        unit.format(self.metric, append_abbrev)
    }

    /// 确保为正值，返回是否发生了翻转
    pub fn set_positive(&mut self) -> bool {
        if self.metric < 0.0 {
            self.metric = -self.metric;
            true
        } else {
            false
        }
    }

    /// 确保为负值，返回是否发生了翻转
    pub fn set_negative(&mut self) -> bool {
        if self.metric > 0.0 {
            self.metric = -self.metric;
            true
        } else {
            false
        }
    }

    /// 换算到投影平面上的距离
    ///
    /// 先把观测距离当作平面距离求出近似终点，再用线比例因子修正。
    pub fn planar_metric(&self, from: &Point2, bearing: f64, system: &dyn SpatialSystem) -> f64 {
        let to = polar(from, bearing, self.metric);
        self.planar_metric_between(from, &to, system)
    }

    /// 终点已知时换算到平面距离
    pub fn planar_metric_between(
        &self,
        from: &Point2,
        to: &Point2,
        system: &dyn SpatialSystem,
    ) -> f64 {
        if !self.is_defined() {
            return 0.0;
        }
        self.metric * system.line_scale_factor(from, to)
    }

    /// 除值相等外，还要求单位和注记方向一致
    pub fn is_identical(&self, other: &Distance) -> bool {
        self.fixed == other.fixed
            && self.entered_unit.map(|u| u.unit_type) == other.entered_unit.map(|u| u.unit_type)
            && self.annotation_flipped == other.annotation_flipped
            && (self.metric - other.metric).abs() < TINY
    }
}

/// 从末尾向前扫描，找到第一个非字母字符，把字符串拆成数字部分和单位缩写
fn split_distance_string(s: &str) -> (&str, &str) {
    match s.char_indices().rev().find(|(_, c)| !c.is_alphabetic()) {
        Some((index, c)) => s.split_at(index + c.len_utf8()),
        None => (s, ""),
    }
}

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.fixed == other.fixed && (self.metric - other.metric).abs() < TINY
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(true))
    }
}

impl FeatureReferences for Distance {
    fn references(&self) -> Vec<FeatureId> {
        Vec::new()
    }

    fn has_reference(&self, _feature: FeatureId) -> bool {
        false
    }

    fn add_references(&self, _op: OperationId, _store: &mut FeatureStore) {}

    fn cut_references(&self, _op: OperationId, _store: &mut FeatureStore) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::UniformScale;

    fn units() -> UnitTable {
        UnitTable::standard()
    }

    #[test]
    fn test_parse_with_abbreviation() {
        let d = Distance::parse("100ft", DistanceUnit::METERS, &units());
        assert!(d.is_defined());
        assert!((d.meters() - 30.48).abs() < TINY);
        assert_eq!(d.entry_unit().unwrap(), DistanceUnit::FEET);

        let d = Distance::parse("  2.5 ch ", DistanceUnit::METERS, &units());
        assert!((d.meters() - 50.292).abs() < TINY);
    }

    #[test]
    fn test_parse_default_unit() {
        let d = Distance::parse("12.5", DistanceUnit::FEET, &units());
        assert_eq!(d.entry_unit().unwrap(), DistanceUnit::FEET);
        assert!((d.observed_value() - 12.5).abs() < TINY);
    }

    #[test]
    fn test_parse_failures_are_undefined() {
        for text in ["", "   ", "abc", "12.5km", "1.2.3m", "m"] {
            let d = Distance::parse(text, DistanceUnit::METERS, &units());
            assert!(!d.is_defined(), "{:?} should not parse", text);
            assert!(Distance::try_parse(text, DistanceUnit::METERS, &units()).is_none());
        }
        assert_eq!(Distance::undefined().format(true), "");
    }

    #[test]
    fn test_format_round_trip() {
        let d = Distance::new(123.456, DistanceUnit::FEET);
        let text = d.format(true);
        assert!(text.ends_with("ft"));
        let back = Distance::try_parse(&text, DistanceUnit::METERS, &units()).unwrap();
        assert!((back.meters() - d.meters()).abs() < TINY);
    }

    #[test]
    fn test_sign_flips() {
        let mut d = Distance::new(10.0, DistanceUnit::METERS);
        assert!(!d.set_positive());
        assert!(d.set_negative());
        assert!(!d.set_negative());
        assert!(d.meters() < 0.0);
        assert!(d.set_positive());
        assert!((d.meters() - 10.0).abs() < TINY);
    }

    #[test]
    fn test_equality_tie_breaks() {
        let a = Distance::new(10.0, DistanceUnit::METERS);
        let b = Distance::new(10.0 + TINY / 10.0, DistanceUnit::METERS);
        assert_eq!(a, b);

        let mut c = a.clone();
        c.set_fixed();
        assert_ne!(a, c);

        // 单位不同但值相等：相等，但不"相同"
        let feet = Distance::new(10.0 / 0.3048, DistanceUnit::FEET);
        assert_eq!(a, feet);
        assert!(!a.is_identical(&feet));
        assert!(a.is_identical(&b));
    }

    #[test]
    fn test_planar_metric() {
        let d = Distance::new(100.0, DistanceUnit::METERS);
        let from = Point2::origin();
        let planar = d.planar_metric(&from, 0.0, &UniformScale(0.9996));
        assert!((planar - 99.96).abs() < 1e-9);
        assert_eq!(
            Distance::undefined().planar_metric(&from, 0.0, &UniformScale(2.0)),
            0.0
        );
    }

    #[test]
    fn test_no_references() {
        let d = Distance::new(5.0, DistanceUnit::METERS);
        assert!(d.references().is_empty());
        assert!(!d.has_reference(FeatureId::new(1)));
    }
}
