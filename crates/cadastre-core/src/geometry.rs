//! 几何服务
//!
//! 观测值推导几何时使用的公式：
//! - 方位角（自北方向顺时针，[0, 2π)）
//! - 极坐标投影
//! - 线比例因子（由投影系统提供，平面距离与地面距离之间的换算）

use crate::math::{normalize_bearing, Point2, TINY};

/// 计算从 `from` 到 `to` 的方位角（弧度）
///
/// 两点重合时返回 0。
pub fn bearing(from: &Point2, to: &Point2) -> f64 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() < TINY && dy.abs() < TINY {
        return 0.0;
    }
    normalize_bearing(dx.atan2(dy))
}

/// 极坐标投影：从 `origin` 沿方位角 `bearing` 前进 `distance`
pub fn polar(origin: &Point2, bearing: f64, distance: f64) -> Point2 {
    Point2::new(
        origin.x + distance * bearing.sin(),
        origin.y + distance * bearing.cos(),
    )
}

/// 空间参考系统
///
/// 投影实现不在本库范围内，这里只需要线比例因子。
pub trait SpatialSystem {
    /// 两点之间线段的比例因子
    fn line_scale_factor(&self, from: &Point2, to: &Point2) -> f64;
}

/// 平面系统（比例因子恒为 1）
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneSystem;

impl SpatialSystem for PlaneSystem {
    fn line_scale_factor(&self, _from: &Point2, _to: &Point2) -> f64 {
        1.0
    }
}

/// 统一比例因子
#[derive(Debug, Clone, Copy)]
pub struct UniformScale(pub f64);

impl SpatialSystem for UniformScale {
    fn line_scale_factor(&self, _from: &Point2, _to: &Point2) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_bearing_quadrants() {
        let o = Point2::origin();
        assert!(bearing(&o, &Point2::new(0.0, 10.0)).abs() < 1e-12);
        assert!((bearing(&o, &Point2::new(10.0, 0.0)) - PI / 2.0).abs() < 1e-12);
        assert!((bearing(&o, &Point2::new(0.0, -10.0)) - PI).abs() < 1e-12);
        assert!((bearing(&o, &Point2::new(-10.0, 0.0)) - 1.5 * PI).abs() < 1e-12);
        assert_eq!(bearing(&o, &o), 0.0);
    }

    #[test]
    fn test_polar() {
        let p = polar(&Point2::new(100.0, 100.0), PI / 2.0, 25.0);
        assert!((p.x - 125.0).abs() < 1e-9);
        assert!((p.y - 100.0).abs() < 1e-9);

        let back = bearing(&Point2::new(100.0, 100.0), &p);
        assert!((back - PI / 2.0).abs() < 1e-12);
    }
}
