//! 编辑器配置

use crate::observation::Distance;
use crate::units::{DistanceUnit, DistanceUnitType, UnitTable};
use serde::{Deserialize, Serialize};

/// 编辑器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// 输入距离没有单位缩写时使用的单位
    pub default_entry_unit: DistanceUnitType,

    /// 保存文件时的 Zstd 压缩级别（1-22）
    pub compression_level: i32,

    /// 空间索引网格大小（米）
    pub spatial_cell_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_entry_unit: DistanceUnitType::Meters,
            compression_level: 3,
            spatial_cell_size: 100.0,
        }
    }
}

impl EditorConfig {
    /// 从 JSON 读取配置，缺省字段使用默认值
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 默认输入单位；`AsEntered` 不是合法的输入单位，退回到米
    pub fn entry_unit(&self) -> DistanceUnit {
        match self.default_entry_unit {
            DistanceUnitType::Feet => DistanceUnit::FEET,
            DistanceUnitType::Chains => DistanceUnit::CHAINS,
            DistanceUnitType::Meters | DistanceUnitType::AsEntered => DistanceUnit::METERS,
        }
    }

    /// 解析用户输入的距离，没有单位缩写时使用默认输入单位
    pub fn parse_distance(&self, text: &str, units: &UnitTable) -> Option<Distance> {
        Distance::try_parse(text, self.entry_unit(), units)
    }
}
