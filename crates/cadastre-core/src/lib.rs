//! 地籍测量编辑核心
//!
//! 提供观测值（距离、角度方向、平行方向）、要素与操作之间的双向引用跟踪，
//! 以及全有或全无的操作回滚。
//!
//! # 架构设计
//!
//! 采用 ID 竞技场模式：
//! - `FeatureStore`: 按 `FeatureId` 存放点要素，每个要素记录依赖它的操作
//! - `Operation`: 按 `OperationId` 存放，拥有自己的观测值
//! - `EditGraph`: 统一维护两侧引用，保证回滚后不留悬挂引用
//!
//! # 示例
//!
//! ```rust
//! use cadastre_core::prelude::*;
//!
//! let mut graph = EditGraph::new();
//! let control = graph.begin_operation(EditKind::GetControl).unwrap();
//! let a = graph.add_point(control, Point2::new(0.0, 0.0)).unwrap();
//! let b = graph.add_point(control, Point2::new(0.0, 100.0)).unwrap();
//!
//! let radial = graph.begin_operation(EditKind::Radial).unwrap();
//! let angle = AngleDirection::new(b, a, RadianValue::from_degrees(90.0));
//! graph.add_observation(radial, angle.into()).unwrap();
//! assert_eq!(graph.dependents_of(a), vec![radial]);
//!
//! graph.rollback(radial).unwrap();
//! assert!(graph.dependents_of(a).is_empty());
//! ```

pub mod angle;
pub mod config;
pub mod feature;
pub mod geometry;
pub mod graph;
pub mod math;
pub mod observation;
pub mod operation;
pub mod shared;
pub mod spatial;
pub mod units;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::angle::RadianValue;
    pub use crate::config::EditorConfig;
    pub use crate::feature::{FeatureId, FeatureStore, PointFeature, PointLookup};
    pub use crate::geometry::{bearing, polar, PlaneSystem, SpatialSystem, UniformScale};
    pub use crate::graph::{EditGraph, GraphError};
    pub use crate::math::{Point2, TINY};
    pub use crate::observation::{
        AngleDirection, Direction, DirectionBase, DirectionType, Distance, FeatureReferences,
        Observation, Offset, ParallelDirection,
    };
    pub use crate::operation::{radial_position, EditKind, Operation, OperationId};
    pub use crate::shared::SharedEditGraph;
    pub use crate::spatial::{Extent, SpatialIndex};
    pub use crate::units::{DistanceUnit, DistanceUnitType, UnitTable};
}
