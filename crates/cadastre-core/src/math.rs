//! 数学基础类型
//!
//! 基于 nalgebra 的二维点，以及全局容差常量。

use std::f64::consts::PI;

/// 二维点（平面坐标，单位：米）
pub type Point2 = nalgebra::Point2<f64>;

/// 标量比较的绝对容差
pub const TINY: f64 = 1.0e-8;

/// 一整圈（弧度）
pub const TWO_PI: f64 = 2.0 * PI;

/// 容差范围内相等
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < TINY
}

/// 米转换为微米（四舍五入）
pub fn to_microns(meters: f64) -> i64 {
    (meters * 1_000_000.0).round() as i64
}

/// 将角度规范化到 [0, 2π)
pub fn normalize_bearing(angle: f64) -> f64 {
    let a = angle.rem_euclid(TWO_PI);
    // rem_euclid 对极小的负数可能返回 2π
    if a >= TWO_PI {
        0.0
    } else {
        a
    }
}
