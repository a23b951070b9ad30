//! 平行方向
//!
//! 方向取自另外两个点所确定的参考线，与任何存储的角度无关。
//! 平行方向总是固定的：没有可调整的观测角，也不提供修改固定状态的方法。

use super::direction::{Direction, DirectionBase, DirectionType};
use super::FeatureReferences;
use crate::angle::RadianValue;
use crate::feature::{FeatureId, FeatureStore, PointLookup};
use crate::geometry::bearing;
use crate::operation::OperationId;

/// 平行方向
#[derive(Debug, Clone, Default)]
pub struct ParallelDirection {
    base: DirectionBase,
    from: Option<FeatureId>,
    /// 参考线起点
    start: Option<FeatureId>,
    /// 参考线终点
    end: Option<FeatureId>,
}

impl ParallelDirection {
    pub fn new(from: FeatureId, start: FeatureId, end: FeatureId) -> Self {
        Self {
            base: DirectionBase::new(),
            from: Some(from),
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn with_base(mut self, base: DirectionBase) -> Self {
        self.base = base;
        self
    }

    pub fn start(&self) -> Option<FeatureId> {
        self.start
    }

    pub fn end(&self) -> Option<FeatureId> {
        self.end
    }

    pub fn set_from(&mut self, from: Option<FeatureId>) {
        self.from = from;
    }

    pub fn set_start(&mut self, start: Option<FeatureId>) {
        self.start = start;
    }

    pub fn set_end(&mut self, end: Option<FeatureId>) {
        self.end = end;
    }

    pub fn is_defined(&self) -> bool {
        self.from.is_some() && self.start.is_some() && self.end.is_some()
    }

    fn own_references(&self) -> impl Iterator<Item = FeatureId> {
        [self.from, self.start, self.end].into_iter().flatten()
    }
}

impl PartialEq for ParallelDirection {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.start == other.start && self.end == other.end
    }
}

impl FeatureReferences for ParallelDirection {
    fn references(&self) -> Vec<FeatureId> {
        let mut result = self.base.references();
        result.extend(self.own_references());
        result
    }

    fn has_reference(&self, feature: FeatureId) -> bool {
        self.own_references().any(|id| id == feature) || self.base.has_reference(feature)
    }

    fn add_references(&self, op: OperationId, store: &mut FeatureStore) {
        self.base.add_references(op, store);
        for id in self.own_references() {
            store.add_op(id, op);
        }
    }

    fn cut_references(&self, op: OperationId, store: &mut FeatureStore) {
        for id in self.own_references() {
            store.cut_op(id, op);
        }
    }

    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        self.cut_references(op, store);
        self.base.on_rollback(op, store);
    }
}

impl Direction for ParallelDirection {
    fn base(&self) -> &DirectionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DirectionBase {
        &mut self.base
    }

    fn from_point(&self) -> Option<FeatureId> {
        self.from
    }

    fn direction_type(&self) -> DirectionType {
        DirectionType::Parallel
    }

    fn observation_in_radians(&self, lookup: &dyn PointLookup) -> f64 {
        self.bearing(lookup).radians()
    }

    fn bearing(&self, lookup: &dyn PointLookup) -> RadianValue {
        let start = self.start.and_then(|id| lookup.position(id));
        let end = self.end.and_then(|id| lookup.position(id));

        match (start, end) {
            (Some(start), Some(end)) => RadianValue::new(bearing(&start, &end)),
            _ => RadianValue::ZERO,
        }
    }

    fn is_fixed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use std::f64::consts::PI;

    #[test]
    fn test_bearing_from_reference_line() {
        let mut store = FeatureStore::new();
        let creator = OperationId::new(1);
        let from = store.insert_point(creator, Point2::new(50.0, 50.0)).unwrap();
        let start = store.insert_point(creator, Point2::new(0.0, 0.0)).unwrap();
        let end = store.insert_point(creator, Point2::new(-10.0, 0.0)).unwrap();

        let dir = ParallelDirection::new(from, start, end);
        assert_eq!(dir.bearing(&store), RadianValue::new(1.5 * PI));
        assert!((dir.observation_in_radians(&store) - 1.5 * PI).abs() < 1e-12);
        assert!(dir.is_fixed());
    }

    #[test]
    fn test_missing_reference_point_degrades_to_zero() {
        let store = FeatureStore::new();
        let mut dir = ParallelDirection::default();
        assert_eq!(dir.bearing(&store), RadianValue::ZERO);

        dir.set_start(Some(FeatureId::new(1)));
        assert_eq!(dir.bearing(&store), RadianValue::ZERO);
        assert!(!dir.is_defined());
    }

    #[test]
    fn test_identity_equality() {
        let a = ParallelDirection::new(FeatureId::new(1), FeatureId::new(2), FeatureId::new(3));
        let b = ParallelDirection::new(FeatureId::new(1), FeatureId::new(2), FeatureId::new(3));
        let c = ParallelDirection::new(FeatureId::new(1), FeatureId::new(3), FeatureId::new(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rollback_cuts_all_three() {
        let mut store = FeatureStore::new();
        let creator = OperationId::new(1);
        let ids: Vec<_> = (0..3)
            .map(|i| store.insert_point(creator, Point2::new(i as f64, 0.0)).unwrap())
            .collect();
        let dir = ParallelDirection::new(ids[0], ids[1], ids[2]);
        let op = OperationId::new(9);

        dir.add_references(op, &mut store);
        assert!(ids.iter().all(|id| store.get(*id).unwrap().is_dependent(op)));

        dir.on_rollback(op, &mut store);
        assert!(ids.iter().all(|id| !store.get(*id).unwrap().is_dependent(op)));
    }
}
