//! 文件操作错误定义

use crate::field::DataField;
use cadastre_core::feature::FeatureId;
use cadastre_core::graph::GraphError;
use cadastre_core::operation::OperationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Field {tag} is not handled by {type_name}")]
    UnhandledField { type_name: String, tag: u8 },

    #[error("Missing required field {field} in {type_name}")]
    MissingField { type_name: String, field: DataField },

    #[error("Field {field} should be {expected}, found {found}")]
    TypeMismatch {
        field: DataField,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unresolved reference to feature {feature} in {op}")]
    UnresolvedReference { op: OperationId, feature: FeatureId },

    #[error("Unknown distance unit code: {0}")]
    UnknownUnit(u8),

    #[error("Unknown edit kind code: {0}")]
    UnknownEditKind(u8),

    #[error("Cannot persist undefined {0}")]
    UndefinedValue(&'static str),

    #[error("Edit graph error: {0}")]
    Graph(#[from] GraphError),
}
