//! 记录写入
//!
//! 每个持久化类型通过 [`Persistent`] 把自己的字段写进 [`RecordWriter`]。
//! 方向变体先写基类层（偏移），再写本层字段。可选字段在默认值时省略。

use crate::error::FileError;
use crate::field::{DataField, FieldValue, Record};
use cadastre_core::angle::RadianValue;
use cadastre_core::feature::{FeatureId, PointFeature};
use cadastre_core::graph::EditGraph;
use cadastre_core::observation::{
    AngleDirection, Direction, DirectionBase, Distance, Observation, Offset, ParallelDirection,
};
use cadastre_core::operation::Operation;

/// 单条记录的写入器
#[derive(Debug)]
pub struct RecordWriter {
    record: Record,
}

impl RecordWriter {
    pub fn new(type_name: &str) -> Self {
        Self {
            record: Record::new(type_name),
        }
    }

    pub fn write_bool(&mut self, field: DataField, value: bool) {
        self.record.push(field, FieldValue::Bool(value));
    }

    pub fn write_byte(&mut self, field: DataField, value: u8) {
        self.record.push(field, FieldValue::Byte(value));
    }

    pub fn write_int(&mut self, field: DataField, value: i64) {
        self.record.push(field, FieldValue::Int(value));
    }

    pub fn write_uint(&mut self, field: DataField, value: u64) {
        self.record.push(field, FieldValue::UInt(value));
    }

    pub fn write_double(&mut self, field: DataField, value: f64) {
        self.record.push(field, FieldValue::Double(value));
    }

    pub fn write_radians(&mut self, field: DataField, value: RadianValue) {
        self.write_double(field, value.radians());
    }

    pub fn write_feature_ref(&mut self, field: DataField, feature: Option<FeatureId>) {
        let raw = feature.map(|f| f.value()).unwrap_or(0);
        self.record.push(field, FieldValue::FeatureRef(raw));
    }

    /// 仅在为真时写入
    pub fn write_flag(&mut self, field: DataField, value: bool) {
        if value {
            self.write_bool(field, true);
        }
    }

    pub fn write_record(&mut self, field: DataField, value: Record) {
        self.record.push(field, FieldValue::Record(value));
    }

    pub fn write_object(&mut self, field: DataField, value: &dyn Persistent) -> Result<(), FileError> {
        let record = value.to_record()?;
        self.write_record(field, record);
        Ok(())
    }

    pub fn write_list(&mut self, field: DataField, values: Vec<Record>) {
        self.record.push(field, FieldValue::List(values));
    }

    pub fn finish(self) -> Record {
        self.record
    }
}

/// 可持久化对象
pub trait Persistent {
    /// 记录的类型名
    fn type_name(&self) -> &'static str;

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError>;

    fn to_record(&self) -> Result<Record, FileError> {
        let mut writer = RecordWriter::new(self.type_name());
        self.write_data(&mut writer)?;
        Ok(writer.finish())
    }
}

pub const POINT_TYPE: &str = "Point";
pub const OPERATION_TYPE: &str = "Operation";
pub const OFFSET_POINT_TYPE: &str = "OffsetPoint";
pub const OFFSET_DISTANCE_TYPE: &str = "OffsetDistance";

impl Persistent for Distance {
    fn type_name(&self) -> &'static str {
        "Distance"
    }

    /// 以输入单位写观测值，便于按原样回显
    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        let unit = self
            .entry_unit()
            .ok_or(FileError::UndefinedValue("distance"))?;
        writer.write_double(DataField::Value, self.observed_value());
        writer.write_byte(DataField::Unit, unit.unit_type.code());
        writer.write_flag(DataField::Fixed, self.is_fixed());
        writer.write_flag(DataField::Flipped, self.is_annotation_flipped());
        Ok(())
    }
}

impl Persistent for Offset {
    fn type_name(&self) -> &'static str {
        match self {
            Offset::Point(_) => OFFSET_POINT_TYPE,
            Offset::Distance { .. } => OFFSET_DISTANCE_TYPE,
        }
    }

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        match self {
            Offset::Point(point) => writer.write_feature_ref(DataField::Id, *point),
            Offset::Distance { distance, left } => {
                distance.write_data(writer)?;
                writer.write_bool(DataField::Left, *left);
            }
        }
        Ok(())
    }
}

/// 基类层：只写偏移
fn write_direction_base(base: &DirectionBase, writer: &mut RecordWriter) -> Result<(), FileError> {
    match &base.offset {
        Some(offset) => writer.write_object(DataField::Offset, offset),
        None => Ok(()),
    }
}

impl Persistent for AngleDirection {
    fn type_name(&self) -> &'static str {
        "AngleDirection"
    }

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        write_direction_base(self.base(), writer)?;
        writer.write_feature_ref(DataField::From, self.from_point());
        writer.write_feature_ref(DataField::Backsight, self.backsight());
        writer.write_radians(DataField::Value, self.angle());
        Ok(())
    }
}

impl Persistent for ParallelDirection {
    fn type_name(&self) -> &'static str {
        "ParallelDirection"
    }

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        write_direction_base(self.base(), writer)?;
        writer.write_feature_ref(DataField::From, self.from_point());
        writer.write_feature_ref(DataField::Start, self.start());
        writer.write_feature_ref(DataField::End, self.end());
        Ok(())
    }
}

impl Persistent for Observation {
    fn type_name(&self) -> &'static str {
        Observation::type_name(self)
    }

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        match self {
            Observation::Distance(d) => d.write_data(writer),
            Observation::AngleDirection(a) => a.write_data(writer),
            Observation::ParallelDirection(p) => p.write_data(writer),
        }
    }
}

impl Persistent for PointFeature {
    fn type_name(&self) -> &'static str {
        POINT_TYPE
    }

    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        writer.write_uint(DataField::Id, u64::from(self.id().value()));
        writer.write_uint(DataField::Creator, u64::from(self.creator().value()));
        writer.write_double(DataField::X, self.x());
        writer.write_double(DataField::Y, self.y());
        Ok(())
    }
}

impl Persistent for Operation {
    fn type_name(&self) -> &'static str {
        OPERATION_TYPE
    }

    /// 创建的要素不写入，加载时由要素的 `Creator` 字段重建
    fn write_data(&self, writer: &mut RecordWriter) -> Result<(), FileError> {
        writer.write_uint(DataField::Id, u64::from(self.id().value()));
        writer.write_byte(DataField::Kind, self.kind().code());
        writer.write_int(DataField::When, self.created_at().timestamp_millis());

        let observations = self
            .observations()
            .iter()
            .map(|o| o.to_record())
            .collect::<Result<Vec<_>, _>>()?;
        writer.write_list(DataField::Observations, observations);
        Ok(())
    }
}

/// 编辑图序列化器
///
/// 按操作ID顺序写出：每个操作记录之后紧跟它创建的点。
#[derive(Debug, Default)]
pub struct EditSerializer;

impl EditSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn records(&self, graph: &EditGraph) -> Result<Vec<Record>, FileError> {
        let mut records = Vec::with_capacity(graph.operation_count() + graph.features().len());

        for operation in graph.operations() {
            records.push(operation.to_record()?);

            for id in operation.creations() {
                let feature = graph.feature(*id).ok_or_else(|| {
                    FileError::Corruption(format!(
                        "{} lists missing feature {} as a creation",
                        operation.id(),
                        id
                    ))
                })?;
                records.push(feature.to_record()?);
            }
        }

        Ok(records)
    }

    pub fn serialize(&self, graph: &EditGraph) -> Result<Vec<u8>, FileError> {
        let records = self.records(graph)?;
        let bytes = rmp_serde::to_vec(&records)?;
        tracing::debug!("Serialized {} records ({} bytes)", records.len(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastre_core::units::DistanceUnit;

    #[test]
    fn test_optional_fields_omitted_at_default() {
        let plain = Distance::new(10.0, DistanceUnit::FEET).to_record().unwrap();
        assert_eq!(
            plain.tags(),
            vec![DataField::Value.code(), DataField::Unit.code()]
        );

        let mut fixed = Distance::new(10.0, DistanceUnit::FEET);
        fixed.set_fixed();
        fixed.set_annotation_flipped(true);
        let record = fixed.to_record().unwrap();
        assert_eq!(record.get(DataField::Fixed), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get(DataField::Flipped), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_observed_value_in_entry_unit() {
        let record = Distance::new(100.0, DistanceUnit::FEET).to_record().unwrap();
        let value = record
            .get(DataField::Value)
            .unwrap()
            .as_double(DataField::Value)
            .unwrap();
        assert!((value - 100.0).abs() < 1e-9);
        assert_eq!(
            record.get(DataField::Unit),
            Some(&FieldValue::Byte(DistanceUnit::FEET.unit_type.code()))
        );
    }

    #[test]
    fn test_undefined_distance_rejected() {
        assert!(matches!(
            Distance::undefined().to_record(),
            Err(FileError::UndefinedValue(_))
        ));
    }

    #[test]
    fn test_base_layer_written_first() {
        let a = FeatureId::new(1);
        let b = FeatureId::new(2);
        let c = FeatureId::new(3);
        let dir = AngleDirection::new(b, a, RadianValue::new(0.5))
            .with_base(DirectionBase::with_offset(Offset::Point(Some(c))));

        let record = dir.to_record().unwrap();
        assert_eq!(record.type_name, "AngleDirection");
        assert_eq!(record.tags()[0], DataField::Offset.code());

        let offset = record
            .get(DataField::Offset)
            .unwrap()
            .as_record(DataField::Offset)
            .unwrap();
        assert_eq!(offset.type_name, OFFSET_POINT_TYPE);
        assert_eq!(offset.get(DataField::Id), Some(&FieldValue::FeatureRef(3)));
    }

    #[test]
    fn test_no_offset_field_without_offset() {
        let dir = ParallelDirection::new(FeatureId::new(1), FeatureId::new(2), FeatureId::new(3));
        let record = dir.to_record().unwrap();
        assert!(!record.contains(DataField::Offset));
        assert_eq!(record.len(), 3);
    }
}
