//! 编辑操作
//!
//! 操作是写事务的单位：拥有一组观测值，并记录它创建的要素。

use crate::feature::{FeatureId, PointLookup};
use crate::geometry::{polar, SpatialSystem};
use crate::math::Point2;
use crate::observation::{Direction, Distance, FeatureReferences, Observation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 操作ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u32);

impl OperationId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// 编辑类型（持久化为单字节代码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EditKind {
    /// 输入新点
    NewPoint = 1,
    /// 导入控制点
    GetControl = 2,
    /// 方向-距离交会
    DirectionDistanceIntersection = 3,
    /// 距离-距离交会
    DistanceDistanceIntersection = 4,
    /// 极坐标放样
    Radial = 5,
}

impl EditKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::NewPoint),
            2 => Some(Self::GetControl),
            3 => Some(Self::DirectionDistanceIntersection),
            4 => Some(Self::DistanceDistanceIntersection),
            5 => Some(Self::Radial),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NewPoint => "New point",
            Self::GetControl => "Get control",
            Self::DirectionDistanceIntersection => "Direction - distance intersection",
            Self::DistanceDistanceIntersection => "Distance - distance intersection",
            Self::Radial => "Radial line",
        }
    }
}

/// 编辑操作
#[derive(Debug, Clone)]
pub struct Operation {
    id: OperationId,
    kind: EditKind,
    created_at: DateTime<Utc>,
    observations: Vec<Observation>,
    /// 本操作创建的要素
    creations: Vec<FeatureId>,
}

impl Operation {
    pub fn new(id: OperationId, kind: EditKind) -> Self {
        Self::with_time(id, kind, Utc::now())
    }

    pub fn with_time(id: OperationId, kind: EditKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            created_at,
            observations: Vec::new(),
            creations: Vec::new(),
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> EditKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn observations_mut(&mut self) -> &mut [Observation] {
        &mut self.observations
    }

    pub fn creations(&self) -> &[FeatureId] {
        &self.creations
    }

    pub fn push_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn push_creation(&mut self, feature: FeatureId) {
        if !self.creations.contains(&feature) {
            self.creations.push(feature);
        }
    }

    /// 本操作所依赖的全部要素（去重，保持首次出现的顺序）
    pub fn required_features(&self) -> Vec<FeatureId> {
        let mut result: Vec<FeatureId> = Vec::new();
        for id in self.observations.iter().flat_map(|o| o.references()) {
            if !result.contains(&id) {
                result.push(id);
            }
        }
        result
    }

    pub fn has_reference(&self, feature: FeatureId) -> bool {
        self.observations.iter().any(|o| o.has_reference(feature))
    }
}

/// 由方向和距离推导出的点位置
///
/// 从方向的测站点出发，沿方向的方位角投影平面距离。测站点无法解析时返回 `None`。
/// 结果不做缓存，要素移动后需要重新推导。
pub fn radial_position(
    direction: &dyn Direction,
    distance: &Distance,
    lookup: &dyn PointLookup,
    system: &dyn SpatialSystem,
) -> Option<Point2> {
    let from = lookup.position(direction.from_point()?)?;
    let bearing = direction.bearing(lookup).radians();
    let planar = distance.planar_metric(&from, bearing, system);
    Some(polar(&from, bearing, planar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::RadianValue;
    use crate::feature::FeatureStore;
    use crate::geometry::PlaneSystem;
    use crate::observation::AngleDirection;
    use crate::units::DistanceUnit;
    use std::f64::consts::PI;

    #[test]
    fn test_edit_kind_codes() {
        for code in 1..=5u8 {
            assert_eq!(EditKind::from_code(code).unwrap().code(), code);
        }
        assert!(EditKind::from_code(0).is_none());
    }

    #[test]
    fn test_required_features_deduplicated() {
        let a = FeatureId::new(1);
        let b = FeatureId::new(2);
        let c = FeatureId::new(3);

        let mut op = Operation::new(OperationId::new(1), EditKind::Radial);
        op.push_observation(AngleDirection::new(b, a, RadianValue::new(0.1)).into());
        op.push_observation(AngleDirection::new(c, a, RadianValue::new(0.2)).into());
        op.push_observation(Distance::new(1.0, DistanceUnit::METERS).into());

        assert_eq!(op.required_features(), vec![a, b, c]);
        assert!(op.has_reference(c));
        assert!(!op.has_reference(FeatureId::new(4)));
    }

    #[test]
    fn test_radial_position() {
        let mut store = FeatureStore::new();
        let creator = OperationId::new(1);
        let from = store.insert_point(creator, Point2::new(0.0, 0.0)).unwrap();
        let backsight = store.insert_point(creator, Point2::new(0.0, 10.0)).unwrap();

        let dir = AngleDirection::new(backsight, from, RadianValue::new(PI / 2.0));
        let dist = Distance::new(25.0, DistanceUnit::METERS);

        let p = radial_position(&dir, &dist, &store, &PlaneSystem).unwrap();
        assert!((p.x - 25.0).abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
    }
}
