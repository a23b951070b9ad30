//! 线程间共享的编辑图
//!
//! 单写者模型：所有修改（编辑、回滚）都在整图写锁内完成，
//! 读者不会看到只分离了一部分的要素集合。

use crate::graph::{EditGraph, GraphError};
use crate::operation::{Operation, OperationId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// 共享编辑图句柄
#[derive(Debug, Clone, Default)]
pub struct SharedEditGraph {
    inner: Arc<RwLock<EditGraph>>,
}

impl SharedEditGraph {
    pub fn new(graph: EditGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, EditGraph> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, EditGraph> {
        self.inner.write()
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&EditGraph) -> R) -> R {
        f(&self.inner.read())
    }

    /// 在写锁内执行一次完整的编辑
    pub fn with_write<R>(&self, f: impl FnOnce(&mut EditGraph) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn rollback(&self, op: OperationId) -> Result<Operation, GraphError> {
        self.inner.write().rollback(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use crate::observation::ParallelDirection;
    use crate::operation::EditKind;
    use std::thread;

    #[test]
    fn test_concurrent_edits_stay_consistent() {
        let shared = SharedEditGraph::default();
        let points: Vec<_> = shared.with_write(|g| {
            let control = g.begin_operation(EditKind::GetControl).unwrap();
            (0..3)
                .map(|i| g.add_point(control, Point2::new(i as f64, 0.0)).unwrap())
                .collect()
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let points = points.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let op = shared.with_write(|g| {
                            let op = g.begin_operation(EditKind::DirectionDistanceIntersection).unwrap();
                            g.add_observation(
                                op,
                                ParallelDirection::new(points[0], points[1], points[2]).into(),
                            )
                            .unwrap();
                            op
                        });
                        shared.with_read(|g| g.check_integrity().unwrap());
                        shared.rollback(op).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let graph = shared.read();
        graph.check_integrity().unwrap();
        assert!(points.iter().all(|p| graph.dependents_of(*p).is_empty()));
        assert_eq!(graph.operation_count(), 1);
    }
}
