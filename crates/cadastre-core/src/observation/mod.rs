//! 观测值
//!
//! 用户为推导几何而输入的测量值：
//! - 距离 (Distance)
//! - 角度方向 (AngleDirection)
//! - 平行方向 (ParallelDirection)
//!
//! 观测值不拥有要素，只持有 [`FeatureId`]。每个变体都实现
//! [`FeatureReferences`]，这是删除/撤销操作时保证引用图完整分离的契约。

mod angle_direction;
mod direction;
mod distance;
mod parallel_direction;

pub use angle_direction::AngleDirection;
pub use direction::{Direction, DirectionBase, DirectionType, Offset};
pub use distance::Distance;
pub use parallel_direction::ParallelDirection;

use crate::angle::RadianValue;
use crate::feature::{FeatureId, FeatureStore, PointLookup};
use crate::operation::OperationId;

/// 要素引用契约
///
/// 每一层（基类层与变体层）只处理自己持有的引用：
/// - `references` 先取基类层，再追加本层字段
/// - `cut_references` 只处理本层字段
/// - `on_rollback` 处理本层后委托给基类层，保证整个层次都被展开
pub trait FeatureReferences {
    /// 所依赖要素的完整枚举（包括基类层）
    fn references(&self) -> Vec<FeatureId>;

    /// 按身份（ID）判断是否引用了指定要素
    fn has_reference(&self, feature: FeatureId) -> bool;

    /// 在所有被引用要素上登记 `op`
    fn add_references(&self, op: OperationId, store: &mut FeatureStore);

    /// 从本层引用的要素上移除 `op`；空引用或已删除的要素直接跳过
    fn cut_references(&self, op: OperationId, store: &mut FeatureStore);

    /// 回滚时调用
    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        self.cut_references(op, store);
    }
}

/// 观测值
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Distance(Distance),
    AngleDirection(AngleDirection),
    ParallelDirection(ParallelDirection),
}

impl Observation {
    /// 类型名称（持久化时作为记录类型）
    pub fn type_name(&self) -> &'static str {
        match self {
            Observation::Distance(_) => "Distance",
            Observation::AngleDirection(_) => "AngleDirection",
            Observation::ParallelDirection(_) => "ParallelDirection",
        }
    }

    pub fn is_defined(&self) -> bool {
        match self {
            Observation::Distance(d) => d.is_defined(),
            Observation::AngleDirection(a) => a.is_defined(),
            Observation::ParallelDirection(p) => p.is_defined(),
        }
    }

    pub fn as_direction(&self) -> Option<&dyn Direction> {
        match self {
            Observation::Distance(_) => None,
            Observation::AngleDirection(a) => Some(a),
            Observation::ParallelDirection(p) => Some(p),
        }
    }

    pub fn as_distance(&self) -> Option<&Distance> {
        match self {
            Observation::Distance(d) => Some(d),
            _ => None,
        }
    }

    /// 方向观测值的方位角；距离没有方位角
    pub fn bearing(&self, lookup: &dyn PointLookup) -> Option<RadianValue> {
        self.as_direction().map(|d| d.bearing(lookup))
    }

    fn layer(&self) -> &dyn FeatureReferences {
        match self {
            Observation::Distance(d) => d,
            Observation::AngleDirection(a) => a,
            Observation::ParallelDirection(p) => p,
        }
    }
}

impl FeatureReferences for Observation {
    fn references(&self) -> Vec<FeatureId> {
        self.layer().references()
    }

    fn has_reference(&self, feature: FeatureId) -> bool {
        self.layer().has_reference(feature)
    }

    fn add_references(&self, op: OperationId, store: &mut FeatureStore) {
        self.layer().add_references(op, store);
    }

    /// 对整个观测值而言，切断引用需要覆盖它点名的每一个要素，
    /// 因此沿层次一直展开到基类层。
    fn cut_references(&self, op: OperationId, store: &mut FeatureStore) {
        self.layer().on_rollback(op, store);
    }

    fn on_rollback(&self, op: OperationId, store: &mut FeatureStore) {
        self.layer().on_rollback(op, store);
    }
}

impl From<Distance> for Observation {
    fn from(d: Distance) -> Self {
        Observation::Distance(d)
    }
}

impl From<AngleDirection> for Observation {
    fn from(a: AngleDirection) -> Self {
        Observation::AngleDirection(a)
    }
}

impl From<ParallelDirection> for Observation {
    fn from(p: ParallelDirection) -> Self {
        Observation::ParallelDirection(p)
    }
}
