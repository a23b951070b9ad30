//! 编辑文件格式（.cedit）
//!
//! 16 字节文件头 + Zstd 压缩的记录流：
//! - 记录流是 MessagePack 编码的 `Vec<Record>`
//! - 字段按标记寻址，可选字段省略，旧版本读取器遇到新字段会明确报错

use crate::error::FileError;
use crate::reader::EditDeserializer;
use crate::writer::EditSerializer;
use cadastre_core::config::EditorConfig;
use cadastre_core::graph::EditGraph;
use cadastre_core::units::UnitTable;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 文件魔数 "CEDT"
const MAGIC: &[u8; 4] = b"CEDT";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// 文件头（16 字节）
#[derive(Debug)]
struct FileHeader {
    /// 魔数 "CEDT"
    magic: [u8; 4],
    /// 格式版本
    version: u32,
    /// 标志位（预留）
    flags: u32,
    /// 压缩后数据长度
    compressed_size: u32,
}

impl FileHeader {
    fn new(compressed_size: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            compressed_size,
        }
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a cadastral edit file".to_string(),
            ));
        }

        let mut buf = [0u8; 4];

        reader.read_exact(&mut buf)?;
        let version = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let flags = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let compressed_size = u32::from_le_bytes(buf);

        Ok(Self {
            magic,
            version,
            flags,
            compressed_size,
        })
    }
}

/// 保存选项
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Zstd 压缩级别（1-22）
    pub compression_level: i32,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::from(&EditorConfig::default())
    }
}

impl From<&EditorConfig> for SaveOptions {
    fn from(config: &EditorConfig) -> Self {
        Self {
            compression_level: config.compression_level.clamp(1, 22),
        }
    }
}

/// 保存编辑图到文件
pub fn save(graph: &EditGraph, path: &Path) -> Result<(), FileError> {
    save_with(graph, path, &SaveOptions::default())
}

pub fn save_with(graph: &EditGraph, path: &Path, options: &SaveOptions) -> Result<(), FileError> {
    let stream = EditSerializer::new().serialize(graph)?;
    let compressed_data = zstd::encode_all(stream.as_slice(), options.compression_level)?;

    let compressed_size = u32::try_from(compressed_data.len()).map_err(|_| {
        FileError::InvalidFormat(format!(
            "Compressed stream too large: {} bytes",
            compressed_data.len()
        ))
    })?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    FileHeader::new(compressed_size).write(&mut writer)?;
    writer.write_all(&compressed_data)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} operations, {} features to {} ({} bytes compressed)",
        graph.operation_count(),
        graph.features().len(),
        path.display(),
        compressed_data.len()
    );

    Ok(())
}

/// 从文件加载编辑图
pub fn load(path: &Path, units: &UnitTable) -> Result<EditGraph, FileError> {
    load_with(path, EditDeserializer::new(units))
}

pub fn load_with(path: &Path, deserializer: EditDeserializer<'_>) -> Result<EditGraph, FileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = FileHeader::read(&mut reader)?;

    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "File version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }
    if header.flags != 0 {
        tracing::warn!("Ignoring unknown header flags {:#x}", header.flags);
    }

    let mut compressed_data = vec![0u8; header.compressed_size as usize];
    reader.read_exact(&mut compressed_data)?;

    let stream = zstd::decode_all(compressed_data.as_slice())?;
    let graph = deserializer.deserialize(&stream)?;

    tracing::info!(
        "Loaded {} operations, {} features from {}",
        graph.operation_count(),
        graph.features().len(),
        path.display()
    );

    Ok(graph)
}
