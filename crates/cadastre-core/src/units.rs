//! 距离单位
//!
//! 所有距离在内部以米为规范单位存储，同时保留用户输入时使用的单位，
//! 以便按原单位格式化回显。

use serde::{Deserialize, Serialize};

/// 距离单位类型（持久化为单字节代码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DistanceUnitType {
    /// 按输入单位显示（仅用于显示，不能作为输入单位）
    AsEntered = 0,
    Meters = 1,
    Feet = 2,
    Chains = 3,
}

impl DistanceUnitType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::AsEntered),
            1 => Some(Self::Meters),
            2 => Some(Self::Feet),
            3 => Some(Self::Chains),
            _ => None,
        }
    }
}

/// 距离单位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceUnit {
    pub unit_type: DistanceUnitType,
    pub name: &'static str,
    pub abbreviation: &'static str,
    /// 每单位对应的米数
    pub multiplier: f64,
    /// 显示时的小数位数
    pub precision: usize,
}

impl DistanceUnit {
    pub const METERS: DistanceUnit = DistanceUnit {
        unit_type: DistanceUnitType::Meters,
        name: "Meters",
        abbreviation: "m",
        multiplier: 1.0,
        precision: 3,
    };

    pub const FEET: DistanceUnit = DistanceUnit {
        unit_type: DistanceUnitType::Feet,
        name: "Feet",
        abbreviation: "ft",
        multiplier: 0.3048,
        precision: 2,
    };

    pub const CHAINS: DistanceUnit = DistanceUnit {
        unit_type: DistanceUnitType::Chains,
        name: "Chains",
        abbreviation: "ch",
        multiplier: 20.1168,
        precision: 4,
    };

    pub const AS_ENTERED: DistanceUnit = DistanceUnit {
        unit_type: DistanceUnitType::AsEntered,
        name: "As Entered",
        abbreviation: "",
        multiplier: 1.0,
        precision: 3,
    };

    pub fn to_metric(&self, value: f64) -> f64 {
        value * self.multiplier
    }

    pub fn from_metric(&self, meters: f64) -> f64 {
        meters / self.multiplier
    }

    /// 无损格式化（最短可回读表示）
    pub fn format(&self, meters: f64, append_abbrev: bool) -> String {
        let value = self.from_metric(meters);
        if append_abbrev {
            format!("{}{}", value, self.abbreviation)
        } else {
            value.to_string()
        }
    }

    /// 按单位精度格式化，用于显示
    pub fn format_rounded(&self, meters: f64, append_abbrev: bool) -> String {
        let value = self.from_metric(meters);
        if append_abbrev {
            format!("{:.*}{}", self.precision, value, self.abbreviation)
        } else {
            format!("{:.*}", self.precision, value)
        }
    }
}

/// 已注册的单位表
#[derive(Debug, Clone)]
pub struct UnitTable {
    units: Vec<DistanceUnit>,
}

impl UnitTable {
    /// 标准单位表：米、英尺、链
    pub fn standard() -> Self {
        Self {
            units: vec![DistanceUnit::METERS, DistanceUnit::FEET, DistanceUnit::CHAINS],
        }
    }

    /// 根据缩写查找输入单位（不区分大小写，前缀匹配）
    ///
    /// 按注册顺序匹配，所以 `"f"` 匹配英尺，`"c"` 匹配链。
    pub fn lookup(&self, abbrev: &str) -> Option<DistanceUnit> {
        let wanted = abbrev.trim().to_uppercase();
        if wanted.is_empty() {
            return None;
        }

        self.units
            .iter()
            .find(|u| u.abbreviation.to_uppercase().starts_with(&wanted))
            .copied()
    }

    /// 根据单位类型获取单位
    pub fn get(&self, unit_type: DistanceUnitType) -> Option<DistanceUnit> {
        if unit_type == DistanceUnitType::AsEntered {
            return Some(DistanceUnit::AS_ENTERED);
        }
        self.units.iter().find(|u| u.unit_type == unit_type).copied()
    }

    pub fn units(&self) -> &[DistanceUnit] {
        &self.units
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::standard()
    }
}
