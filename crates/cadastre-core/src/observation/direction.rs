//! 方向观测值的公共部分
//!
//! 所有方向变体都内嵌一个 [`DirectionBase`]，它是方向家族的"基类层"，
//! 持有可选的偏移量。偏移点同样是一个要素引用，变体在枚举、比较和
//! 回滚引用时必须把这一层一并算上。

use super::{Distance, FeatureReferences};
use crate::angle::RadianValue;
use crate::feature::{FeatureId, FeatureStore, PointLookup};
use crate::operation::OperationId;

/// 方向类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionType {
    Angle,
    Parallel,
}

/// 方向偏移
#[derive(Debug, Clone, PartialEq)]
pub enum Offset {
    /// 方向线经过的偏移点
    Point(Option<FeatureId>),
    /// 与方向线平行的偏移距离
    Distance { distance: Distance, left: bool },
}

impl FeatureReferences for Offset {
    fn references(&self) -> Vec<FeatureId> {
        match self {
            Offset::Point(Some(point)) => vec![*point],
            _ => Vec::new(),
        }
    }

    fn has_reference(&self, feature: FeatureId) -> bool {
        matches!(self, Offset::Point(Some(point)) if *point == feature)
    }

    fn add_references(&self, op: OperationId, store: &mut FeatureStore) {
        if let Offset::Point(Some(point)) = self {
            store.add_op(*point, op);
        }
    }

    fn cut_references(&self, op: OperationId, store: &mut FeatureStore) {
        if let Offset::Point(Some(point)) = self {
            store.cut_op(*point, op);
        }
    }

    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        match self {
            Offset::Point(_) => self.cut_references(op, store),
            Offset::Distance { distance, .. } => distance.on_rollback(op, store),
        }
    }
}

/// 方向的基类层
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionBase {
    pub offset: Option<Offset>,
}

impl DirectionBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: Offset) -> Self {
        Self {
            offset: Some(offset),
        }
    }
}

impl FeatureReferences for DirectionBase {
    fn references(&self) -> Vec<FeatureId> {
        self.offset
            .as_ref()
            .map(|o| o.references())
            .unwrap_or_default()
    }

    fn has_reference(&self, feature: FeatureId) -> bool {
        self.offset
            .as_ref()
            .is_some_and(|o| o.has_reference(feature))
    }

    fn add_references(&self, op: OperationId, store: &mut FeatureStore) {
        if let Some(offset) = &self.offset {
            offset.add_references(op, store);
        }
    }

    fn cut_references(&self, op: OperationId, store: &mut FeatureStore) {
        if let Some(offset) = &self.offset {
            offset.cut_references(op, store);
        }
    }

    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        if let Some(offset) = &self.offset {
            offset.on_rollback(op, store);
        }
    }
}

/// 方向观测值的能力集合
pub trait Direction: FeatureReferences {
    fn base(&self) -> &DirectionBase;

    fn base_mut(&mut self) -> &mut DirectionBase;

    /// 测站点
    fn from_point(&self) -> Option<FeatureId>;

    fn direction_type(&self) -> DirectionType;

    /// 供角度平差使用的观测值（弧度）
    fn observation_in_radians(&self, lookup: &dyn PointLookup) -> f64;

    /// 由几何定义推导出的方位角，范围 [0, 2π)
    fn bearing(&self, lookup: &dyn PointLookup) -> RadianValue;

    /// 观测值是否固定（不参与平差调整）
    fn is_fixed(&self) -> bool {
        false
    }

    fn offset(&self) -> Option<&Offset> {
        self.base().offset.as_ref()
    }

    fn set_offset(&mut self, offset: Option<Offset>) {
        self.base_mut().offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    #[test]
    fn test_offset_point_references() {
        let mut store = FeatureStore::new();
        let p = store.insert_point(OperationId::new(1), Point2::origin()).unwrap();
        let base = DirectionBase::with_offset(Offset::Point(Some(p)));
        let op = OperationId::new(2);

        assert_eq!(base.references(), vec![p]);
        assert!(base.has_reference(p));

        base.add_references(op, &mut store);
        assert!(store.get(p).unwrap().is_dependent(op));

        base.on_rollback(op, &mut store);
        assert!(!store.get(p).unwrap().is_dependent(op));
    }

    #[test]
    fn test_offset_distance_has_no_references() {
        let base = DirectionBase::with_offset(Offset::Distance {
            distance: Distance::new(5.0, crate::units::DistanceUnit::METERS),
            left: true,
        });
        assert!(base.references().is_empty());
        assert!(!DirectionBase::new().has_reference(FeatureId::new(1)));
    }
}
