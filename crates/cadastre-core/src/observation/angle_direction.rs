//! 角度方向
//!
//! 在测站点上以后视点为参考方向观测的角度。

use super::direction::{Direction, DirectionBase, DirectionType};
use super::FeatureReferences;
use crate::angle::RadianValue;
use crate::feature::{FeatureId, FeatureStore, PointLookup};
use crate::geometry::bearing;
use crate::math::{normalize_bearing, TINY};
use crate::operation::OperationId;

/// 角度方向
#[derive(Debug, Clone, Default)]
pub struct AngleDirection {
    base: DirectionBase,
    /// 测站点
    from: Option<FeatureId>,
    /// 后视点
    backsight: Option<FeatureId>,
    /// 观测角（弧度），负值表示逆时针
    angle: f64,
}

impl AngleDirection {
    pub fn new(backsight: FeatureId, from: FeatureId, angle: RadianValue) -> Self {
        Self {
            base: DirectionBase::new(),
            from: Some(from),
            backsight: Some(backsight),
            angle: angle.radians(),
        }
    }

    pub fn with_base(mut self, base: DirectionBase) -> Self {
        self.base = base;
        self
    }

    pub fn backsight(&self) -> Option<FeatureId> {
        self.backsight
    }

    pub fn angle(&self) -> RadianValue {
        RadianValue::new(self.angle)
    }

    pub fn set_from(&mut self, from: Option<FeatureId>) {
        self.from = from;
    }

    pub fn set_backsight(&mut self, backsight: Option<FeatureId>) {
        self.backsight = backsight;
    }

    pub fn set_angle(&mut self, angle: RadianValue) {
        self.angle = angle.radians();
    }

    pub fn is_defined(&self) -> bool {
        self.from.is_some() && self.backsight.is_some()
    }
}

impl PartialEq for AngleDirection {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.backsight == other.backsight
            && (self.angle - other.angle).abs() < TINY
    }
}

impl FeatureReferences for AngleDirection {
    fn references(&self) -> Vec<FeatureId> {
        let mut result = self.base.references();
        result.extend(self.from);
        result.extend(self.backsight);
        result
    }

    fn has_reference(&self, feature: FeatureId) -> bool {
        self.from == Some(feature)
            || self.backsight == Some(feature)
            || self.base.has_reference(feature)
    }

    fn add_references(&self, op: OperationId, store: &mut FeatureStore) {
        self.base.add_references(op, store);
        for id in [self.from, self.backsight].into_iter().flatten() {
            store.add_op(id, op);
        }
    }

    fn cut_references(&self, op: OperationId, store: &mut FeatureStore) {
        for id in [self.from, self.backsight].into_iter().flatten() {
            store.cut_op(id, op);
        }
    }

    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        self.cut_references(op, store);
        self.base.on_rollback(op, store);
    }
}

impl Direction for AngleDirection {
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
        DirectionType::Angle
    }

    fn observation_in_radians(&self, _lookup: &dyn PointLookup) -> f64 {
        self.angle
    }

    fn bearing(&self, lookup: &dyn PointLookup) -> RadianValue {
        let from = self.from.and_then(|id| lookup.position(id));
        let backsight = self.backsight.and_then(|id| lookup.position(id));

        match (from, backsight) {
            (Some(from), Some(backsight)) => {
                // 后视方位角加上观测角
                let bb = bearing(&from, &backsight);
                RadianValue::new(normalize_bearing(bb + self.angle))
            }
            _ => {
                tracing::debug!(
                    "Angle direction has unresolved points (from={:?}, backsight={:?})",
                    self.from,
                    self.backsight
                );
                RadianValue::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use crate::observation::Offset;
    use std::f64::consts::PI;

    fn setup() -> (FeatureStore, FeatureId, FeatureId) {
        let mut store = FeatureStore::new();
        let creator = OperationId::new(1);
        let from = store.insert_point(creator, Point2::new(0.0, 0.0)).unwrap();
        let backsight = store.insert_point(creator, Point2::new(0.0, 10.0)).unwrap();
        (store, from, backsight)
    }

    #[test]
    fn test_bearing_derivation() {
        let (store, from, backsight) = setup();

        let right = AngleDirection::new(backsight, from, RadianValue::new(PI / 2.0));
        assert_eq!(right.bearing(&store), RadianValue::new(PI / 2.0));

        let left = AngleDirection::new(backsight, from, RadianValue::new(-PI / 2.0));
        assert_eq!(left.bearing(&store), RadianValue::new(1.5 * PI));
    }

    #[test]
    fn test_bearing_follows_point_moves() {
        let (mut store, from, backsight) = setup();
        let dir = AngleDirection::new(backsight, from, RadianValue::new(PI / 2.0));

        assert!(store.move_point(backsight, Point2::new(10.0, 0.0)));
        assert_eq!(dir.bearing(&store), RadianValue::new(PI));
    }

    #[test]
    fn test_unresolved_points_give_zero_bearing() {
        let store = FeatureStore::new();
        let dir = AngleDirection::new(FeatureId::new(5), FeatureId::new(6), RadianValue::new(1.0));
        assert_eq!(dir.bearing(&store), RadianValue::ZERO);
    }

    #[test]
    fn test_equality() {
        let (_, from, backsight) = setup();
        let a = AngleDirection::new(backsight, from, RadianValue::new(1.0));
        let b = AngleDirection::new(backsight, from, RadianValue::new(1.0 + TINY / 4.0));
        let c = AngleDirection::new(from, backsight, RadianValue::new(1.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, AngleDirection::new(backsight, from, RadianValue::new(1.1)));
    }

    #[test]
    fn test_references_include_base_layer() {
        let (mut store, from, backsight) = setup();
        let offset = store.insert_point(OperationId::new(1), Point2::new(5.0, 5.0)).unwrap();
        let other = store.insert_point(OperationId::new(1), Point2::new(9.0, 9.0)).unwrap();

        let dir = AngleDirection::new(backsight, from, RadianValue::new(0.5))
            .with_base(DirectionBase::with_offset(Offset::Point(Some(offset))));

        let refs = dir.references();
        assert_eq!(refs, vec![offset, from, backsight]);
        for id in &refs {
            assert!(dir.has_reference(*id));
        }
        assert!(!dir.has_reference(other));

        let op = OperationId::new(2);
        dir.add_references(op, &mut store);
        dir.on_rollback(op, &mut store);
        for id in refs {
            assert!(!store.get(id).unwrap().is_dependent(op));
        }
    }
}
