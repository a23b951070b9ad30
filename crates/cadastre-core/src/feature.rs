//! 点要素与要素存储
//!
//! 要素由整体的要素存储拥有，观测值只持有 [`FeatureId`]。
//! 每个要素维护一个反向引用集合，记录哪些操作依赖于它。

use crate::graph::GraphError;
use crate::math::Point2;
use crate::operation::OperationId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 要素内部ID（非零；持久化格式中 0 表示"无要素"）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

impl FeatureId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 从持久化的原始值恢复，0 表示空引用
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 按ID查询点位置
pub trait PointLookup {
    fn position(&self, id: FeatureId) -> Option<Point2>;
}

/// 点要素
#[derive(Debug, Clone)]
pub struct PointFeature {
    id: FeatureId,
    position: Point2,
    creator: OperationId,
    /// 引用此要素的操作
    dependents: BTreeSet<OperationId>,
}

impl PointFeature {
    pub fn new(id: FeatureId, creator: OperationId, position: Point2) -> Self {
        Self {
            id,
            position,
            creator,
            dependents: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn creator(&self) -> OperationId {
        self.creator
    }

    pub fn dependents(&self) -> &BTreeSet<OperationId> {
        &self.dependents
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.is_empty()
    }

    pub fn is_dependent(&self, op: OperationId) -> bool {
        self.dependents.contains(&op)
    }

    /// 记录一个依赖于此要素的操作
    pub fn add_op(&mut self, op: OperationId) {
        self.dependents.insert(op);
    }

    /// 移除依赖操作，返回是否确实移除（重复调用是无害的）
    pub fn cut_op(&mut self, op: OperationId) -> bool {
        self.dependents.remove(&op)
    }

    fn set_position(&mut self, position: Point2) {
        self.position = position;
    }
}

/// 要素存储（以ID为索引的arena）
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    points: BTreeMap<FeatureId, PointFeature>,
    next_id: u32,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self {
            points: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> Result<FeatureId, GraphError> {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = FeatureId(self.next_id);
        self.next_id = next_after(id)?;
        Ok(id)
    }

    /// 创建新的点要素
    pub fn insert_point(
        &mut self,
        creator: OperationId,
        position: Point2,
    ) -> Result<FeatureId, GraphError> {
        let id = self.allocate_id()?;
        self.points.insert(id, PointFeature::new(id, creator, position));
        Ok(id)
    }

    /// 以已知ID恢复点要素（反序列化时使用）
    pub fn restore_point(
        &mut self,
        id: FeatureId,
        creator: OperationId,
        position: Point2,
    ) -> Result<(), GraphError> {
        if self.points.contains_key(&id) {
            return Err(GraphError::DuplicateFeature(id));
        }
        let next = next_after(id)?;
        self.points.insert(id, PointFeature::new(id, creator, position));
        self.next_id = self.next_id.max(next);
        Ok(())
    }

    pub fn get(&self, id: FeatureId) -> Option<&PointFeature> {
        self.points.get(&id)
    }

    pub fn get_mut(&mut self, id: FeatureId) -> Option<&mut PointFeature> {
        self.points.get_mut(&id)
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.points.contains_key(&id)
    }

    /// 添加反向引用；要素不存在时返回 false
    pub fn add_op(&mut self, id: FeatureId, op: OperationId) -> bool {
        match self.points.get_mut(&id) {
            Some(point) => {
                point.add_op(op);
                true
            }
            None => false,
        }
    }

    /// 移除反向引用；要素已不存在时不做任何事
    pub fn cut_op(&mut self, id: FeatureId, op: OperationId) {
        if let Some(point) = self.points.get_mut(&id) {
            point.cut_op(op);
        }
    }

    /// 移动点要素，返回要素是否存在
    pub fn move_point(&mut self, id: FeatureId, position: Point2) -> bool {
        match self.points.get_mut(&id) {
            Some(point) => {
                point.set_position(position);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: FeatureId) -> Option<PointFeature> {
        self.points.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointFeature> {
        self.points.values()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 紧随 `id` 之后的分配值；`u32::MAX` 之后没有可用ID
fn next_after(id: FeatureId) -> Result<u32, GraphError> {
    id.0.checked_add(1).ok_or(GraphError::IdExhausted {
        kind: "feature",
        last: id.0,
    })
}

impl PointLookup for FeatureStore {
    fn position(&self, id: FeatureId) -> Option<Point2> {
        self.points.get(&id).map(|p| p.position)
    }
}
