//! 字段标记的记录模型
//!
//! 每个持久化对象写成一条 [`Record`]：类型名 + 有序的 (标记, 值) 列表。
//! 标记以原始字节保存，解码阶段不认识的标记不会导致 MessagePack 解析失败，
//! 而是交给各层的字段分派去判断。

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 稳定的字段标记（持久化为单字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataField {
    Id = 1,
    Creator = 2,
    X = 3,
    Y = 4,
    Kind = 5,
    When = 6,
    Observations = 7,
    Backsight = 10,
    From = 11,
    Value = 12,
    Unit = 13,
    Fixed = 14,
    Flipped = 15,
    Start = 16,
    End = 17,
    Offset = 18,
    Left = 19,
}

impl DataField {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let field = match code {
            1 => Self::Id,
            2 => Self::Creator,
            3 => Self::X,
            4 => Self::Y,
            5 => Self::Kind,
            6 => Self::When,
            7 => Self::Observations,
            10 => Self::Backsight,
            11 => Self::From,
            12 => Self::Value,
            13 => Self::Unit,
            14 => Self::Fixed,
            15 => Self::Flipped,
            16 => Self::Start,
            17 => Self::End,
            18 => Self::Offset,
            19 => Self::Left,
            _ => return None,
        };
        Some(field)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Creator => "Creator",
            Self::X => "X",
            Self::Y => "Y",
            Self::Kind => "Kind",
            Self::When => "When",
            Self::Observations => "Observations",
            Self::Backsight => "Backsight",
            Self::From => "From",
            Self::Value => "Value",
            Self::Unit => "Unit",
            Self::Fixed => "Fixed",
            Self::Flipped => "Flipped",
            Self::Start => "Start",
            Self::End => "End",
            Self::Offset => "Offset",
            Self::Left => "Left",
        }
    }
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// 自描述的字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Byte(u8),
    Int(i64),
    UInt(u64),
    Double(f64),
    /// 要素引用，0 表示空引用
    FeatureRef(u32),
    Record(Record),
    List(Vec<Record>),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Double(_) => "double",
            Self::FeatureRef(_) => "feature reference",
            Self::Record(_) => "record",
            Self::List(_) => "list",
        }
    }

    fn mismatch(&self, field: DataField, expected: &'static str) -> FileError {
        FileError::TypeMismatch {
            field,
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self, field: DataField) -> Result<bool, FileError> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(self.mismatch(field, "bool")),
        }
    }

    pub fn as_byte(&self, field: DataField) -> Result<u8, FileError> {
        match self {
            Self::Byte(v) => Ok(*v),
            _ => Err(self.mismatch(field, "byte")),
        }
    }

    pub fn as_int(&self, field: DataField) -> Result<i64, FileError> {
        match self {
            Self::Int(v) => Ok(*v),
            _ => Err(self.mismatch(field, "int")),
        }
    }

    pub fn as_uint(&self, field: DataField) -> Result<u64, FileError> {
        match self {
            Self::UInt(v) => Ok(*v),
            _ => Err(self.mismatch(field, "uint")),
        }
    }

    pub fn as_double(&self, field: DataField) -> Result<f64, FileError> {
        match self {
            Self::Double(v) => Ok(*v),
            _ => Err(self.mismatch(field, "double")),
        }
    }

    pub fn as_feature_ref(&self, field: DataField) -> Result<u32, FileError> {
        match self {
            Self::FeatureRef(v) => Ok(*v),
            _ => Err(self.mismatch(field, "feature reference")),
        }
    }

    pub fn as_record(&self, field: DataField) -> Result<&Record, FileError> {
        match self {
            Self::Record(v) => Ok(v),
            _ => Err(self.mismatch(field, "record")),
        }
    }

    pub fn as_list(&self, field: DataField) -> Result<&[Record], FileError> {
        match self {
            Self::List(v) => Ok(v),
            _ => Err(self.mismatch(field, "list")),
        }
    }
}

/// 一条持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(u8, FieldValue)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, field: DataField, value: FieldValue) {
        self.fields.push((field.code(), value));
    }

    /// 按标记查找字段（取第一个）
    pub fn get(&self, field: DataField) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(tag, _)| *tag == field.code())
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: DataField) -> bool {
        self.get(field).is_some()
    }

    /// 写入顺序中的字段标记
    pub fn tags(&self) -> Vec<u8> {
        self.fields.iter().map(|(tag, _)| *tag).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
