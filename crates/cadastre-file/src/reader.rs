//! 记录读取
//!
//! 字段逐个分派：对记录中的每个标记（顺序任意），先询问最派生的层，
//! 返回 [`FieldStatus::NotHandled`] 时再交给基类层。没有任何层认领的
//! 标记是致命错误。
//!
//! 要素引用在所指要素的记录出现之前就可能被读到。这类前向引用先被挂起，
//! 整个流读完之后通过 [`ApplyFeatureRef`] 统一回填；无法解析的引用同样是致命错误。

use crate::error::FileError;
use crate::field::{DataField, FieldValue, Record};
use crate::writer::{OFFSET_DISTANCE_TYPE, OFFSET_POINT_TYPE, OPERATION_TYPE, POINT_TYPE};
use cadastre_core::angle::RadianValue;
use cadastre_core::config::EditorConfig;
use cadastre_core::feature::FeatureId;
use cadastre_core::graph::{EditGraph, GraphError};
use cadastre_core::math::Point2;
use cadastre_core::observation::{
    AngleDirection, Direction, DirectionBase, Distance, Observation, Offset, ParallelDirection,
};
use cadastre_core::operation::{EditKind, Operation, OperationId};
use cadastre_core::units::{DistanceUnitType, UnitTable};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// 单层字段处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Handled,
    NotHandled,
}

/// 挂起的前向引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRef {
    pub op: OperationId,
    /// 观测值在操作中的下标
    pub observation: usize,
    pub field: DataField,
    pub id: FeatureId,
}

/// 读取上下文
pub struct ReadContext<'a> {
    units: &'a UnitTable,
    /// 已经读到的要素
    known: &'a BTreeSet<FeatureId>,
    /// 当前对象中挂起的引用
    pending: Vec<(DataField, FeatureId)>,
}

impl<'a> ReadContext<'a> {
    pub fn new(units: &'a UnitTable, known: &'a BTreeSet<FeatureId>) -> Self {
        Self {
            units,
            known,
            pending: Vec::new(),
        }
    }

    pub fn units(&self) -> &UnitTable {
        self.units
    }

    /// 读取要素引用
    ///
    /// 已知要素直接返回；尚未出现的要素记为挂起，返回 `None`，
    /// 稍后以 `field` 为键回填。
    pub fn feature_ref(
        &mut self,
        field: DataField,
        value: &FieldValue,
    ) -> Result<Option<FeatureId>, FileError> {
        let Some(id) = FeatureId::from_raw(value.as_feature_ref(field)?) else {
            return Ok(None);
        };

        if self.known.contains(&id) {
            Ok(Some(id))
        } else {
            self.pending.push((field, id));
            Ok(None)
        }
    }

    pub fn take_pending(&mut self) -> Vec<(DataField, FeatureId)> {
        std::mem::take(&mut self.pending)
    }
}

/// 可逐字段读取的层
pub trait ReadLayer {
    /// 本层（含基类层）必需的字段
    const REQUIRED: &'static [DataField] = &[];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError>;
}

/// 把记录的全部字段分派给 `layer`
pub fn read_record<L: ReadLayer>(
    record: &Record,
    layer: &mut L,
    ctx: &mut ReadContext<'_>,
) -> Result<(), FileError> {
    for field in L::REQUIRED {
        if !record.contains(*field) {
            return Err(FileError::MissingField {
                type_name: record.type_name.clone(),
                field: *field,
            });
        }
    }

    for (tag, value) in &record.fields {
        let status = match DataField::from_code(*tag) {
            Some(field) => layer.read_field(field, value, ctx)?,
            None => FieldStatus::NotHandled,
        };

        if status == FieldStatus::NotHandled {
            return Err(FileError::UnhandledField {
                type_name: record.type_name.clone(),
                tag: *tag,
            });
        }
    }

    Ok(())
}

/// 前向引用回填
pub trait ApplyFeatureRef {
    /// 把 `feature` 填入 `field` 对应的位置，返回该字段是否被本对象认领
    fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool;
}

// ============================================================================
// 观测值各层
// ============================================================================

impl ReadLayer for DirectionBase {
    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::Offset => {
                self.offset = Some(read_offset(value.as_record(field)?, ctx)?);
                Ok(FieldStatus::Handled)
            }
            _ => Ok(FieldStatus::NotHandled),
        }
    }
}

impl ApplyFeatureRef for DirectionBase {
    fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool {
        match (field, &mut self.offset) {
            (DataField::Offset, Some(Offset::Point(point))) => {
                *point = Some(feature);
                true
            }
            _ => false,
        }
    }
}

fn read_offset(record: &Record, ctx: &mut ReadContext<'_>) -> Result<Offset, FileError> {
    match record.type_name.as_str() {
        OFFSET_POINT_TYPE => {
            let mut reader = OffsetPointReader::default();
            read_record(record, &mut reader, ctx)?;
            Ok(Offset::Point(reader.point))
        }
        OFFSET_DISTANCE_TYPE => {
            let mut reader = OffsetDistanceReader::default();
            read_record(record, &mut reader, ctx)?;
            Ok(Offset::Distance {
                distance: reader.distance.finish(ctx.units())?,
                left: reader.left,
            })
        }
        other => Err(FileError::UnknownType(other.to_string())),
    }
}

#[derive(Default)]
struct OffsetPointReader {
    point: Option<FeatureId>,
}

impl ReadLayer for OffsetPointReader {
    const REQUIRED: &'static [DataField] = &[DataField::Id];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            // 挂起时按外层的偏移字段回填
            DataField::Id => {
                self.point = ctx.feature_ref(DataField::Offset, value)?;
                Ok(FieldStatus::Handled)
            }
            _ => Ok(FieldStatus::NotHandled),
        }
    }
}

#[derive(Default)]
struct OffsetDistanceReader {
    distance: DistanceReader,
    left: bool,
}

impl ReadLayer for OffsetDistanceReader {
    const REQUIRED: &'static [DataField] = &[DataField::Value, DataField::Unit, DataField::Left];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::Left => {
                self.left = value.as_bool(field)?;
                Ok(FieldStatus::Handled)
            }
            _ => self.distance.read_field(field, value, ctx),
        }
    }
}

/// 距离的字段收集器，值和单位都读到之后才能构造
#[derive(Debug, Default)]
pub struct DistanceReader {
    value: Option<f64>,
    unit: Option<u8>,
    fixed: bool,
    flipped: bool,
}

impl DistanceReader {
    pub fn finish(self, units: &UnitTable) -> Result<Distance, FileError> {
        let value = self.value.ok_or(FileError::MissingField {
            type_name: "Distance".to_string(),
            field: DataField::Value,
        })?;
        let code = self.unit.ok_or(FileError::MissingField {
            type_name: "Distance".to_string(),
            field: DataField::Unit,
        })?;

        let unit = DistanceUnitType::from_code(code)
            .filter(|t| *t != DistanceUnitType::AsEntered)
            .and_then(|t| units.get(t))
            .ok_or(FileError::UnknownUnit(code))?;

        let mut distance = Distance::new(value, unit);
        if self.fixed {
            distance.set_fixed();
        }
        distance.set_annotation_flipped(self.flipped);
        Ok(distance)
    }
}

impl ReadLayer for DistanceReader {
    const REQUIRED: &'static [DataField] = &[DataField::Value, DataField::Unit];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        _ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::Value => self.value = Some(value.as_double(field)?),
            DataField::Unit => self.unit = Some(value.as_byte(field)?),
            DataField::Fixed => self.fixed = value.as_bool(field)?,
            DataField::Flipped => self.flipped = value.as_bool(field)?,
            _ => return Ok(FieldStatus::NotHandled),
        }
        Ok(FieldStatus::Handled)
    }
}

impl ReadLayer for AngleDirection {
    const REQUIRED: &'static [DataField] = &[DataField::From, DataField::Backsight, DataField::Value];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::From => self.set_from(ctx.feature_ref(field, value)?),
            DataField::Backsight => self.set_backsight(ctx.feature_ref(field, value)?),
            DataField::Value => self.set_angle(RadianValue::new(value.as_double(field)?)),
            _ => return self.base_mut().read_field(field, value, ctx),
        }
        Ok(FieldStatus::Handled)
    }
}

impl ApplyFeatureRef for AngleDirection {
    fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool {
        match field {
            DataField::From => self.set_from(Some(feature)),
            DataField::Backsight => self.set_backsight(Some(feature)),
            _ => return self.base_mut().apply_feature_ref(field, feature),
        }
        true
    }
}

impl ReadLayer for ParallelDirection {
    const REQUIRED: &'static [DataField] = &[DataField::From, DataField::Start, DataField::End];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::From => self.set_from(ctx.feature_ref(field, value)?),
            DataField::Start => self.set_start(ctx.feature_ref(field, value)?),
            DataField::End => self.set_end(ctx.feature_ref(field, value)?),
            _ => return self.base_mut().read_field(field, value, ctx),
        }
        Ok(FieldStatus::Handled)
    }
}

impl ApplyFeatureRef for ParallelDirection {
    fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool {
        match field {
            DataField::From => self.set_from(Some(feature)),
            DataField::Start => self.set_start(Some(feature)),
            DataField::End => self.set_end(Some(feature)),
            _ => return self.base_mut().apply_feature_ref(field, feature),
        }
        true
    }
}

impl ApplyFeatureRef for Observation {
    fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool {
        match self {
            Observation::Distance(_) => false,
            Observation::AngleDirection(a) => a.apply_feature_ref(field, feature),
            Observation::ParallelDirection(p) => p.apply_feature_ref(field, feature),
        }
    }
}

/// 读取一个观测值记录
pub fn read_observation(record: &Record, ctx: &mut ReadContext<'_>) -> Result<Observation, FileError> {
    match record.type_name.as_str() {
        "Distance" => {
            let mut reader = DistanceReader::default();
            read_record(record, &mut reader, ctx)?;
            Ok(reader.finish(ctx.units())?.into())
        }
        "AngleDirection" => {
            let mut angle = AngleDirection::default();
            read_record(record, &mut angle, ctx)?;
            Ok(angle.into())
        }
        "ParallelDirection" => {
            let mut parallel = ParallelDirection::default();
            read_record(record, &mut parallel, ctx)?;
            Ok(parallel.into())
        }
        other => Err(FileError::UnknownType(other.to_string())),
    }
}

// ============================================================================
// 点与操作
// ============================================================================

#[derive(Default)]
struct PointReader {
    id: u64,
    creator: u64,
    x: f64,
    y: f64,
}

impl ReadLayer for PointReader {
    const REQUIRED: &'static [DataField] = &[DataField::Id, DataField::Creator, DataField::X, DataField::Y];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        _ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::Id => self.id = value.as_uint(field)?,
            DataField::Creator => self.creator = value.as_uint(field)?,
            DataField::X => self.x = value.as_double(field)?,
            DataField::Y => self.y = value.as_double(field)?,
            _ => return Ok(FieldStatus::NotHandled),
        }
        Ok(FieldStatus::Handled)
    }
}

#[derive(Default)]
struct OperationReader {
    id: u64,
    kind: u8,
    when: i64,
    /// 观测值及其挂起的引用
    observations: Vec<(Observation, Vec<(DataField, FeatureId)>)>,
}

impl ReadLayer for OperationReader {
    const REQUIRED: &'static [DataField] = &[DataField::Id, DataField::Kind];

    fn read_field(
        &mut self,
        field: DataField,
        value: &FieldValue,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldStatus, FileError> {
        match field {
            DataField::Id => self.id = value.as_uint(field)?,
            DataField::Kind => self.kind = value.as_byte(field)?,
            DataField::When => self.when = value.as_int(field)?,
            DataField::Observations => {
                for record in value.as_list(field)? {
                    let observation = read_observation(record, ctx)?;
                    self.observations.push((observation, ctx.take_pending()));
                }
            }
            _ => return Ok(FieldStatus::NotHandled),
        }
        Ok(FieldStatus::Handled)
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32, FileError> {
    u32::try_from(value).map_err(|_| FileError::Corruption(format!("{what} {value} out of range")))
}

fn feature_id(value: u64) -> Result<FeatureId, FileError> {
    FeatureId::from_raw(to_u32(value, "feature id")?)
        .ok_or_else(|| FileError::Corruption("null feature id".to_string()))
}

fn operation_id(value: u64) -> Result<OperationId, FileError> {
    match to_u32(value, "operation id")? {
        0 => Err(FileError::Corruption("null operation id".to_string())),
        id => Ok(OperationId::new(id)),
    }
}

// ============================================================================
// 反序列化器
// ============================================================================

/// 编辑图反序列化器
///
/// 第一遍按顺序读出所有记录并挂起前向引用；第二遍回填引用；
/// 全部成功后才构建并返回新的编辑图。
pub struct EditDeserializer<'a> {
    units: &'a UnitTable,
    config: EditorConfig,
}

impl<'a> EditDeserializer<'a> {
    pub fn new(units: &'a UnitTable) -> Self {
        Self {
            units,
            config: EditorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<EditGraph, FileError> {
        let records: Vec<Record> = rmp_serde::from_slice(bytes)?;
        self.read_records(&records)
    }

    pub fn read_records(&self, records: &[Record]) -> Result<EditGraph, FileError> {
        let mut known = BTreeSet::new();
        let mut points: BTreeMap<FeatureId, (OperationId, Point2)> = BTreeMap::new();
        let mut operations: BTreeMap<OperationId, Operation> = BTreeMap::new();
        let mut forward_refs = Vec::new();

        for record in records {
            match record.type_name.as_str() {
                POINT_TYPE => {
                    let mut reader = PointReader::default();
                    read_record(record, &mut reader, &mut ReadContext::new(self.units, &known))?;

                    let id = feature_id(reader.id)?;
                    let creator = operation_id(reader.creator)?;
                    if points
                        .insert(id, (creator, Point2::new(reader.x, reader.y)))
                        .is_some()
                    {
                        return Err(GraphError::DuplicateFeature(id).into());
                    }
                    known.insert(id);
                }
                OPERATION_TYPE => {
                    let mut reader = OperationReader::default();
                    read_record(record, &mut reader, &mut ReadContext::new(self.units, &known))?;

                    let id = operation_id(reader.id)?;
                    let kind = EditKind::from_code(reader.kind)
                        .ok_or(FileError::UnknownEditKind(reader.kind))?;
                    let when = DateTime::<Utc>::from_timestamp_millis(reader.when).ok_or_else(|| {
                        FileError::Corruption(format!("invalid timestamp {} in {}", reader.when, id))
                    })?;

                    let mut operation = Operation::with_time(id, kind, when);
                    for (index, (observation, pending)) in reader.observations.into_iter().enumerate() {
                        forward_refs.extend(pending.into_iter().map(|(field, feature)| ForwardRef {
                            op: id,
                            observation: index,
                            field,
                            id: feature,
                        }));
                        operation.push_observation(observation);
                    }

                    if operations.insert(id, operation).is_some() {
                        return Err(GraphError::DuplicateOperation(id).into());
                    }
                }
                other => return Err(FileError::UnknownType(other.to_string())),
            }
        }

        // 第二遍：回填前向引用
        for fwd in &forward_refs {
            if !points.contains_key(&fwd.id) {
                return Err(FileError::UnresolvedReference {
                    op: fwd.op,
                    feature: fwd.id,
                });
            }

            let observation = operations
                .get_mut(&fwd.op)
                .and_then(|op| op.observations_mut().get_mut(fwd.observation))
                .ok_or_else(|| {
                    FileError::Corruption(format!("dangling forward reference in {}", fwd.op))
                })?;

            if !observation.apply_feature_ref(fwd.field, fwd.id) {
                return Err(FileError::UnhandledField {
                    type_name: observation.type_name().to_string(),
                    tag: fwd.field.code(),
                });
            }
        }

        if !forward_refs.is_empty() {
            tracing::debug!("Resolved {} forward references", forward_refs.len());
        }

        // 构建编辑图
        let mut graph = EditGraph::with_config(&self.config);
        for (id, (creator, position)) in &points {
            let Some(operation) = operations.get_mut(creator) else {
                return Err(FileError::Corruption(format!(
                    "feature {} created by unknown {}",
                    id, creator
                )));
            };
            operation.push_creation(*id);
            graph.restore_point(*id, *creator, *position)?;
        }

        for operation in operations.into_values() {
            graph.restore_operation(operation)?;
        }

        graph.check_integrity()?;
        Ok(graph)
    }
}
