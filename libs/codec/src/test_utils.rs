//! Test fixtures: a miniature OSI-shaped schema and framing helpers
//!
//! The schema is assembled from `prost_types` descriptor protos so tests in
//! every crate can build, encode and validate messages without `protoc`.
//! Type and field names mirror the real `osi3` package closely enough for
//! rule files written against OSI to apply unchanged.

use crate::framing::SEPARATOR;
use once_cell::sync::Lazy;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};

pub const FIXTURE_PACKAGE: &str = "osi3";

static FIXTURE_SET: Lazy<FileDescriptorSet> = Lazy::new(build_descriptor_set);

static FIXTURE_POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    DescriptorPool::from_file_descriptor_set(FIXTURE_SET.clone())
        .expect("fixture descriptor set is well-formed")
});

/// Shared pool holding the fixture schema
pub fn fixture_pool() -> DescriptorPool {
    FIXTURE_POOL.clone()
}

/// Serialized `FileDescriptorSet` as written by `protoc --descriptor_set_out`
pub fn encoded_descriptor_set() -> Vec<u8> {
    FIXTURE_SET.encode_to_vec()
}

/// Descriptor of a fixture message by local name, e.g. `"GroundTruth"`
pub fn descriptor(name: &str) -> MessageDescriptor {
    FIXTURE_POOL
        .get_message_by_name(&format!("{}.{}", FIXTURE_PACKAGE, name))
        .unwrap_or_else(|| panic!("fixture schema has no message {}", name))
}

/// Empty dynamic message of a fixture type
pub fn new_message(name: &str) -> DynamicMessage {
    DynamicMessage::new(descriptor(name))
}

/// Frame payloads with 4-byte little-endian length prefixes
pub fn frame_length_prefixed(payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }
    out
}

/// Join payloads with the legacy `$$__$$` separator
pub fn frame_separated(payloads: &[Vec<u8>]) -> Vec<u8> {
    payloads.join(SEPARATOR)
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: Some(format!(".{}.{}", FIXTURE_PACKAGE, type_name)),
        ..Default::default()
    }
}

fn message(name: &str, type_name: &str, number: i32) -> FieldDescriptorProto {
    typed(name, number, Type::Message, type_name, Label::Optional)
}

fn repeated(name: &str, type_name: &str, number: i32) -> FieldDescriptorProto {
    typed(name, number, Type::Message, type_name, Label::Repeated)
}

fn record(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

fn doubles(name: &str, fields: [&str; 3]) -> DescriptorProto {
    record(
        name,
        fields
            .iter()
            .enumerate()
            .map(|(i, f)| scalar(f, i as i32 + 1, Type::Double))
            .collect(),
    )
}

fn build_descriptor_set() -> FileDescriptorSet {
    let moving_type = EnumDescriptorProto {
        name: Some("Type".to_string()),
        value: ["TYPE_UNKNOWN", "TYPE_OTHER", "TYPE_VEHICLE", "TYPE_PEDESTRIAN"]
            .iter()
            .enumerate()
            .map(|(i, v)| EnumValueDescriptorProto {
                name: Some(v.to_string()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let mut moving_object = record(
        "MovingObject",
        vec![
            message("id", "Identifier", 1),
            message("base", "BaseMoving", 2),
            typed("type", 3, Type::Enum, "MovingObject.Type", Label::Optional),
            message("vehicle_classification", "MovingObject.VehicleClassification", 4),
        ],
    );
    moving_object.enum_type.push(moving_type);
    moving_object
        .nested_type
        .push(record("VehicleClassification", vec![scalar("type", 1, Type::Int32)]));

    let file = FileDescriptorProto {
        name: Some("osi_fixture.proto".to_string()),
        package: Some(FIXTURE_PACKAGE.to_string()),
        syntax: Some("proto2".to_string()),
        message_type: vec![
            record(
                "Timestamp",
                vec![scalar("seconds", 1, Type::Int64), scalar("nanos", 2, Type::Uint32)],
            ),
            record("Identifier", vec![scalar("value", 1, Type::Uint64)]),
            doubles("Vector3d", ["x", "y", "z"]),
            doubles("Dimension3d", ["length", "width", "height"]),
            doubles("Orientation3d", ["roll", "pitch", "yaw"]),
            record(
                "BaseStationary",
                vec![
                    message("dimension", "Dimension3d", 1),
                    message("position", "Vector3d", 2),
                    message("orientation", "Orientation3d", 3),
                ],
            ),
            record(
                "BaseMoving",
                vec![
                    message("dimension", "Dimension3d", 1),
                    message("position", "Vector3d", 2),
                    message("orientation", "Orientation3d", 3),
                    message("velocity", "Vector3d", 4),
                ],
            ),
            record(
                "StationaryObject",
                vec![message("id", "Identifier", 1), message("base", "BaseStationary", 2)],
            ),
            moving_object,
            record(
                "GroundTruth",
                vec![
                    message("timestamp", "Timestamp", 1),
                    message("host_vehicle_id", "Identifier", 2),
                    repeated("stationary_object", "StationaryObject", 3),
                    repeated("moving_object", "MovingObject", 4),
                    scalar("country_code", 5, Type::String),
                ],
            ),
            record(
                "SensorView",
                vec![
                    message("timestamp", "Timestamp", 1),
                    message("global_ground_truth", "GroundTruth", 2),
                    message("host_vehicle_id", "Identifier", 3),
                ],
            ),
        ],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }
}
