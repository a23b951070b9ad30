//! 编辑依赖图
//!
//! `EditGraph` 拥有要素存储和全部操作，负责维护双向引用：
//! 观测值点名要素，要素反过来记录依赖它的操作。
//!
//! 所有修改都是"全有或全无"的：先完成校验，再修改状态，
//! 不会出现只分离了部分观测值的中间状态。

use crate::config::EditorConfig;
use crate::feature::{FeatureId, FeatureStore, PointFeature};
use crate::math::Point2;
use crate::observation::{FeatureReferences, Observation};
use crate::operation::{EditKind, Operation, OperationId};
use crate::spatial::{Extent, SpatialIndex};
use std::collections::BTreeMap;
use thiserror::Error;

/// 编辑图错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Operation not found: {0}")]
    OperationNotFound(OperationId),

    #[error("Feature not found: {0}")]
    FeatureNotFound(FeatureId),

    #[error("{op} has no observation at index {index}")]
    ObservationNotFound { op: OperationId, index: usize },

    #[error("Feature {feature} is still required by {dependent}")]
    FeatureInUse {
        feature: FeatureId,
        dependent: OperationId,
    },

    #[error("Duplicate feature: {0}")]
    DuplicateFeature(FeatureId),

    #[error("Duplicate operation: {0}")]
    DuplicateOperation(OperationId),

    #[error("No {kind} id left after {last}")]
    IdExhausted { kind: &'static str, last: u32 },

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// 编辑依赖图
#[derive(Debug)]
pub struct EditGraph {
    features: FeatureStore,
    operations: BTreeMap<OperationId, Operation>,
    index: SpatialIndex,
    next_op: u32,
}

impl EditGraph {
    pub fn new() -> Self {
        Self::with_config(&EditorConfig::default())
    }

    pub fn with_config(config: &EditorConfig) -> Self {
        Self {
            features: FeatureStore::new(),
            operations: BTreeMap::new(),
            index: SpatialIndex::new(config.spatial_cell_size),
            next_op: 1,
        }
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&PointFeature> {
        self.features.get(id)
    }

    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(&id)
    }

    /// 按ID顺序遍历全部操作
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    /// 窗口内的点要素
    pub fn find_points(&self, window: &Extent) -> Vec<FeatureId> {
        self.index.query_window(window)
    }

    /// 依赖于指定要素的操作
    pub fn dependents_of(&self, feature: FeatureId) -> Vec<OperationId> {
        self.features
            .get(feature)
            .map(|f| f.dependents().iter().copied().collect())
            .unwrap_or_default()
    }

    /// 开始一个新操作
    pub fn begin_operation(&mut self, kind: EditKind) -> Result<OperationId, GraphError> {
        let id = OperationId(self.next_op);
        self.next_op = next_op_after(id)?;
        self.operations.insert(id, Operation::new(id, kind));
        tracing::debug!("Began {} ({})", id, kind.name());
        Ok(id)
    }

    /// 由操作创建新点
    pub fn add_point(&mut self, op: OperationId, position: Point2) -> Result<FeatureId, GraphError> {
        let operation = self
            .operations
            .get_mut(&op)
            .ok_or(GraphError::OperationNotFound(op))?;

        let id = self.features.insert_point(op, position)?;
        operation.push_creation(id);
        self.index.insert(id, Extent::at(position));

        tracing::debug!("{} created point {} at ({}, {})", op, id, position.x, position.y);
        Ok(id)
    }

    /// 把观测值交给操作，并在被引用的要素上登记反向引用
    ///
    /// 任何被引用的要素不存在时整个调用失败，图保持不变。
    pub fn add_observation(
        &mut self,
        op: OperationId,
        observation: Observation,
    ) -> Result<(), GraphError> {
        let operation = self
            .operations
            .get_mut(&op)
            .ok_or(GraphError::OperationNotFound(op))?;

        if let Some(missing) = observation
            .references()
            .into_iter()
            .find(|id| !self.features.contains(*id))
        {
            return Err(GraphError::FeatureNotFound(missing));
        }

        observation.add_references(op, &mut self.features);
        operation.push_observation(observation);
        Ok(())
    }

    /// 用新的观测值替换操作中已有的观测值，返回被替换的旧值
    ///
    /// 新值引用的要素全部存在时才开始修改：先切断旧值的引用，再登记新值的引用。
    /// 同一操作的其他观测值仍然引用的要素会保留反向引用。
    pub fn replace_observation(
        &mut self,
        op: OperationId,
        index: usize,
        observation: Observation,
    ) -> Result<Observation, GraphError> {
        let operation = self
            .operations
            .get_mut(&op)
            .ok_or(GraphError::OperationNotFound(op))?;
        if index >= operation.observations().len() {
            return Err(GraphError::ObservationNotFound { op, index });
        }

        if let Some(missing) = observation
            .references()
            .into_iter()
            .find(|id| !self.features.contains(*id))
        {
            return Err(GraphError::FeatureNotFound(missing));
        }

        let slot = &mut operation.observations_mut()[index];
        slot.cut_references(op, &mut self.features);
        observation.add_references(op, &mut self.features);
        let old = std::mem::replace(slot, observation);

        for other in operation.observations() {
            other.add_references(op, &mut self.features);
        }

        tracing::debug!(
            "{} replaced observation {} ({} -> {})",
            op,
            index,
            old.type_name(),
            operation.observations()[index].type_name()
        );
        Ok(old)
    }

    /// 恢复一个已持久化的点要素
    pub fn restore_point(
        &mut self,
        id: FeatureId,
        creator: OperationId,
        position: Point2,
    ) -> Result<(), GraphError> {
        self.features.restore_point(id, creator, position)?;
        self.index.insert(id, Extent::at(position));
        Ok(())
    }

    /// 恢复一个已持久化的操作，重建它在要素上的反向引用
    pub fn restore_operation(&mut self, operation: Operation) -> Result<(), GraphError> {
        let op = operation.id();
        if self.operations.contains_key(&op) {
            return Err(GraphError::DuplicateOperation(op));
        }
        let next = next_op_after(op)?;

        for id in operation.creations() {
            let feature = self
                .features
                .get(*id)
                .ok_or(GraphError::FeatureNotFound(*id))?;
            if feature.creator() != op {
                return Err(GraphError::Integrity(format!(
                    "{} lists {} as a creation, but it was created by {}",
                    op,
                    id,
                    feature.creator()
                )));
            }
        }

        if let Some(missing) = operation
            .required_features()
            .into_iter()
            .find(|id| !self.features.contains(*id))
        {
            return Err(GraphError::FeatureNotFound(missing));
        }

        for observation in operation.observations() {
            observation.add_references(op, &mut self.features);
        }

        self.next_op = self.next_op.max(next);
        self.operations.insert(op, operation);
        Ok(())
    }

    /// 移动点要素。依赖它的几何需要调用方重新推导。
    pub fn move_point(&mut self, id: FeatureId, position: Point2) -> Result<(), GraphError> {
        if !self.features.move_point(id, position) {
            return Err(GraphError::FeatureNotFound(id));
        }
        self.index.update(id, Extent::at(position));
        tracing::debug!("Moved {} to ({}, {})", id, position.x, position.y);
        Ok(())
    }

    /// 回滚（删除）一个操作
    ///
    /// 先确认该操作创建的要素没有被其他操作依赖，然后对每个观测值调用
    /// `on_rollback`，删除创建的要素，最后移除操作本身。返回被移除的操作。
    pub fn rollback(&mut self, op: OperationId) -> Result<Operation, GraphError> {
        let operation = self
            .operations
            .get(&op)
            .ok_or(GraphError::OperationNotFound(op))?;

        for id in operation.creations() {
            if let Some(feature) = self.features.get(*id) {
                if let Some(dependent) = feature.dependents().iter().find(|d| **d != op) {
                    return Err(GraphError::FeatureInUse {
                        feature: *id,
                        dependent: *dependent,
                    });
                }
            }
        }

        let Some(operation) = self.operations.remove(&op) else {
            return Err(GraphError::OperationNotFound(op));
        };

        for observation in operation.observations() {
            observation.on_rollback(op, &mut self.features);
        }

        for id in operation.creations() {
            self.features.remove(*id);
            self.index.remove(*id);
        }

        tracing::debug!(
            "Rolled back {} ({} observations, {} creations)",
            op,
            operation.observations().len(),
            operation.creations().len()
        );
        Ok(operation)
    }

    /// 撤销最后一个操作
    pub fn undo_last(&mut self) -> Result<Option<Operation>, GraphError> {
        match self.operations.keys().next_back().copied() {
            Some(op) => self.rollback(op).map(Some),
            None => Ok(None),
        }
    }

    /// 校验双向引用的一致性
    ///
    /// 操作引用的每个要素都必须记录该操作；要素记录的每个操作都必须存在
    /// 并且确实引用该要素。
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        for operation in self.operations.values() {
            for id in operation.required_features() {
                let feature = self
                    .features
                    .get(id)
                    .ok_or(GraphError::FeatureNotFound(id))?;
                if !feature.is_dependent(operation.id()) {
                    return Err(GraphError::Integrity(format!(
                        "{} references {} but is missing from its dependents",
                        operation.id(),
                        id
                    )));
                }
            }
        }

        for feature in self.features.iter() {
            for dependent in feature.dependents() {
                let referenced = self
                    .operations
                    .get(dependent)
                    .is_some_and(|o| o.has_reference(feature.id()));
                if !referenced {
                    tracing::warn!("Stale dependent {} on feature {}", dependent, feature.id());
                    return Err(GraphError::Integrity(format!(
                        "{} lists {} as a dependent that does not reference it",
                        feature.id(),
                        dependent
                    )));
                }
            }
        }

        Ok(())
    }
}

fn next_op_after(id: OperationId) -> Result<u32, GraphError> {
    id.0.checked_add(1).ok_or(GraphError::IdExhausted {
        kind: "operation",
        last: id.0,
    })
}

impl Default for EditGraph {
    fn default() -> Self {
        Self::new()
    }
}
