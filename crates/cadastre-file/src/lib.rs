//! 地籍编辑文件格式
//!
//! 支持：
//! - 字段标记的记录序列化，可选字段、前向引用回填
//! - `.cedit` 原生文件格式（MessagePack + Zstd）

pub mod error;
pub mod field;
pub mod native;
pub mod reader;
pub mod writer;

pub use error::FileError;
pub use field::{DataField, FieldValue, Record};
pub use native::{load, save, SaveOptions};
pub use reader::{ApplyFeatureRef, EditDeserializer, FieldStatus, ForwardRef, ReadContext, ReadLayer};
pub use writer::{EditSerializer, Persistent, RecordWriter};
