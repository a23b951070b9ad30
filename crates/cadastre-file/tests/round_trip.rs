//! 序列化往返与前向引用测试

use cadastre_core::prelude::*;
use cadastre_file::{
    native, DataField, EditDeserializer, EditSerializer, FieldValue, FileError, Record, SaveOptions,
};
use std::f64::consts::PI;

/// 覆盖全部观测值变体，以及可选字段的默认值与非默认值
fn survey() -> EditGraph {
    let mut graph = EditGraph::new();
    let control = graph.begin_operation(EditKind::GetControl).unwrap();
    let a = graph.add_point(control, Point2::new(1000.0, 2000.0)).unwrap();
    let b = graph.add_point(control, Point2::new(1000.0, 2100.0)).unwrap();
    let c = graph.add_point(control, Point2::new(1050.0, 2050.0)).unwrap();

    let radial = graph.begin_operation(EditKind::Radial).unwrap();
    graph
        .add_observation(radial, AngleDirection::new(b, a, RadianValue::from_degrees(45.0)).into())
        .unwrap();
    graph
        .add_observation(radial, Distance::new(150.0, DistanceUnit::FEET).into())
        .unwrap();
    graph.add_point(radial, Point2::new(1032.3, 2032.3)).unwrap();

    let intersect = graph.begin_operation(EditKind::DirectionDistanceIntersection).unwrap();
    let offset_angle = AngleDirection::new(a, c, RadianValue::new(-PI / 3.0))
        .with_base(DirectionBase::with_offset(Offset::Point(Some(b))));
    graph.add_observation(intersect, offset_angle.into()).unwrap();

    let mut offset_distance = Distance::new(2.5, DistanceUnit::CHAINS);
    offset_distance.set_fixed();
    let parallel = ParallelDirection::new(c, a, b).with_base(DirectionBase::with_offset(
        Offset::Distance {
            distance: offset_distance,
            left: true,
        },
    ));
    graph.add_observation(intersect, parallel.into()).unwrap();

    let mut fixed = Distance::new(12.345, DistanceUnit::METERS);
    fixed.set_fixed();
    fixed.set_annotation_flipped(true);
    graph.add_observation(intersect, fixed.into()).unwrap();
    graph.add_point(intersect, Point2::new(1010.0, 2060.0)).unwrap();

    graph
}

fn assert_same_graph(expected: &EditGraph, actual: &EditGraph) {
    assert_eq!(expected.operation_count(), actual.operation_count());
    assert_eq!(expected.features().len(), actual.features().len());

    for feature in expected.features().iter() {
        let other = actual.feature(feature.id()).expect("feature restored");
        assert_eq!(other.position(), feature.position());
        assert_eq!(other.creator(), feature.creator());
        assert_eq!(other.dependents(), feature.dependents());
    }

    for op in expected.operations() {
        let other = actual.operation(op.id()).expect("operation restored");
        assert_eq!(other.kind(), op.kind());
        assert_eq!(
            other.created_at().timestamp_millis(),
            op.created_at().timestamp_millis()
        );
        assert_eq!(other.creations(), op.creations());
        assert_eq!(other.observations(), op.observations());

        for (x, y) in op.observations().iter().zip(other.observations()) {
            let offsets = |o: &Observation| o.as_direction().and_then(|d| d.offset().cloned());
            assert_eq!(offsets(x), offsets(y));

            if let (Some(dx), Some(dy)) = (x.as_distance(), y.as_distance()) {
                assert!(dx.is_identical(dy));
            }
        }
    }

    actual.check_integrity().unwrap();
}

fn deserialize(records: &[Record]) -> Result<EditGraph, FileError> {
    let units = UnitTable::standard();
    EditDeserializer::new(&units).read_records(records)
}

#[test]
fn round_trip_preserves_every_variant() {
    let graph = survey();
    let bytes = EditSerializer::new().serialize(&graph).unwrap();

    let units = UnitTable::standard();
    let loaded = EditDeserializer::new(&units).deserialize(&bytes).unwrap();
    assert_same_graph(&graph, &loaded);
}

#[test]
fn forward_references_resolve_in_any_order() {
    let graph = survey();
    let records = EditSerializer::new().records(&graph).unwrap();

    // 所有点放到最后：每个要素引用都是前向引用
    let (points, ops): (Vec<_>, Vec<_>) = records
        .iter()
        .cloned()
        .partition(|r| r.type_name == "Point");
    let points_last: Vec<_> = ops.into_iter().chain(points).collect();
    assert_same_graph(&graph, &deserialize(&points_last).unwrap());

    let mut reversed = records.clone();
    reversed.reverse();
    assert_same_graph(&graph, &deserialize(&reversed).unwrap());
}

#[test]
fn unresolved_reference_is_fatal() {
    let graph = survey();
    let mut records = EditSerializer::new().records(&graph).unwrap();

    // 删除第一个控制点（被后续操作引用）
    let index = records
        .iter()
        .position(|r| r.type_name == "Point")
        .unwrap();
    records.remove(index);

    assert!(matches!(
        deserialize(&records),
        Err(FileError::UnresolvedReference { feature, .. }) if feature == FeatureId::new(1)
    ));
}

#[test]
fn unknown_field_in_observation_is_fatal() {
    let graph = survey();
    let mut records = EditSerializer::new().records(&graph).unwrap();

    let radial = records
        .iter_mut()
        .filter(|r| r.type_name == "Operation")
        .nth(1)
        .unwrap();
    for (tag, value) in radial.fields.iter_mut() {
        if *tag == DataField::Observations.code() {
            if let FieldValue::List(observations) = value {
                observations[0].fields.push((250, FieldValue::Bool(true)));
            }
        }
    }

    assert!(matches!(
        deserialize(&records),
        Err(FileError::UnhandledField { tag: 250, .. })
    ));
}

#[test]
fn unknown_record_type_is_fatal() {
    let mut records = EditSerializer::new().records(&survey()).unwrap();
    records.push(Record::new("Polygon"));

    assert!(matches!(
        deserialize(&records),
        Err(FileError::UnknownType(name)) if name == "Polygon"
    ));
}

fn point_record(id: u64, creator: u64) -> Record {
    let mut record = Record::new("Point");
    record.push(DataField::Id, FieldValue::UInt(id));
    record.push(DataField::Creator, FieldValue::UInt(creator));
    record.push(DataField::X, FieldValue::Double(0.0));
    record.push(DataField::Y, FieldValue::Double(0.0));
    record
}

fn operation_record(id: u64) -> Record {
    let mut record = Record::new("Operation");
    record.push(DataField::Id, FieldValue::UInt(id));
    record.push(DataField::Kind, FieldValue::Byte(EditKind::NewPoint.code()));
    record
}

#[test]
fn last_feature_id_is_rejected() {
    let records = [operation_record(1), point_record(u32::MAX as u64, 1)];
    assert!(matches!(
        deserialize(&records),
        Err(FileError::Graph(GraphError::IdExhausted { kind: "feature", .. }))
    ));

    // 倒数第二个ID仍然可以加载
    let records = [operation_record(1), point_record(u32::MAX as u64 - 1, 1)];
    assert_eq!(deserialize(&records).unwrap().features().len(), 1);
}

#[test]
fn last_operation_id_is_rejected() {
    let records = [operation_record(u32::MAX as u64)];
    assert!(matches!(
        deserialize(&records),
        Err(FileError::Graph(GraphError::IdExhausted { kind: "operation", .. }))
    ));

    // 加载后新操作的ID空间已用完，返回错误而不是回绕
    let mut loaded = deserialize(&[operation_record(u32::MAX as u64 - 1)]).unwrap();
    assert!(matches!(
        loaded.begin_operation(EditKind::NewPoint),
        Err(GraphError::IdExhausted { .. })
    ));
    assert_eq!(loaded.operation_count(), 1);
}

#[test]
fn loaded_graph_supports_rollback() {
    let graph = survey();
    let bytes = EditSerializer::new().serialize(&graph).unwrap();
    let units = UnitTable::standard();
    let mut loaded = EditDeserializer::new(&units).deserialize(&bytes).unwrap();

    let intersect = OperationId::new(3);
    loaded.rollback(intersect).unwrap();
    for feature in loaded.features().iter() {
        assert!(!feature.is_dependent(intersect));
    }

    // 新操作的ID不会与已加载的操作冲突
    let next = loaded.begin_operation(EditKind::NewPoint).unwrap();
    assert_eq!(next, OperationId::new(4));
}

#[test]
fn file_round_trip_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parcel.cedit");

    let config = EditorConfig::from_json(r#"{ "compression_level": 19 }"#).unwrap();
    let graph = survey();
    native::save_with(&graph, &path, &SaveOptions::from(&config)).unwrap();

    let loaded = native::load(&path, &UnitTable::standard()).unwrap();
    assert_same_graph(&graph, &loaded);
}
