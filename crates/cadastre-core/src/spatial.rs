//! 空间索引
//!
//! 编辑图只需要范围重叠和点包含两种查询。这里用基于网格的简单实现，
//! 需要时可以替换为R-tree。

use crate::feature::FeatureId;
use crate::math::Point2;
use std::collections::{HashMap, HashSet};

/// 单个要素最多占用的网格数，超出的要素单独存放
const MAX_CELLS_PER_EXTENT: u128 = 1024;

/// 轴对齐的范围窗口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Point2,
    pub max: Point2,
}

impl Extent {
    pub fn new(a: Point2, b: Point2) -> Self {
        Self {
            min: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// 单点范围
    pub fn at(p: Point2) -> Self {
        Self { min: p, max: p }
    }

    /// 以点为中心、给定半宽的方形范围
    pub fn around(p: Point2, half_width: f64) -> Self {
        Self::new(
            Point2::new(p.x - half_width, p.y - half_width),
            Point2::new(p.x + half_width, p.y + half_width),
        )
    }

    pub fn overlaps(&self, other: &Extent) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// 闭区间的网格坐标范围
#[derive(Debug, Clone, Copy)]
struct CellRange {
    min: (i64, i64),
    max: (i64, i64),
}

impl CellRange {
    /// 覆盖的网格数（饱和计算，无穷坐标不会溢出）
    fn count(&self) -> u128 {
        let span = |lo: i64, hi: i64| (i128::from(hi) - i128::from(lo) + 1).max(0) as u128;
        span(self.min.0, self.max.0).saturating_mul(span(self.min.1, self.max.1))
    }

    fn cells(self) -> impl Iterator<Item = (i64, i64)> {
        let (min_gy, max_gy) = (self.min.1, self.max.1);
        (self.min.0..=self.max.0).flat_map(move |gx| (min_gy..=max_gy).map(move |gy| (gx, gy)))
    }
}

/// 基于网格的空间索引
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,

    /// 网格坐标 -> 要素列表
    grid: HashMap<(i64, i64), Vec<FeatureId>>,

    extents: HashMap<FeatureId, Extent>,

    /// 范围过大、不进入网格的要素
    oversized: HashSet<FeatureId>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 100.0 },
            grid: HashMap::new(),
            extents: HashMap::new(),
            oversized: HashSet::new(),
        }
    }

    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    fn cell_range(&self, extent: &Extent) -> CellRange {
        CellRange {
            min: self.to_grid_coord(extent.min.x, extent.min.y),
            max: self.to_grid_coord(extent.max.x, extent.max.y),
        }
    }

    fn cell_count(&self, extent: &Extent) -> u128 {
        self.cell_range(extent).count()
    }

    fn cells_for(&self, extent: &Extent) -> impl Iterator<Item = (i64, i64)> {
        self.cell_range(extent).cells()
    }

    pub fn insert(&mut self, id: FeatureId, extent: Extent) {
        self.remove(id);

        if self.cell_count(&extent) > MAX_CELLS_PER_EXTENT {
            self.oversized.insert(id);
        } else {
            for cell in self.cells_for(&extent) {
                self.grid.entry(cell).or_default().push(id);
            }
        }
        self.extents.insert(id, extent);
    }

    pub fn remove(&mut self, id: FeatureId) -> bool {
        let Some(extent) = self.extents.remove(&id) else {
            return false;
        };
        if self.oversized.remove(&id) {
            return true;
        }

        for cell in self.cells_for(&extent) {
            if let Some(ids) = self.grid.get_mut(&cell) {
                ids.retain(|e| *e != id);
                if ids.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
        true
    }

    pub fn update(&mut self, id: FeatureId, extent: Extent) {
        self.insert(id, extent);
    }

    /// 与窗口重叠的全部要素（按ID排序）
    ///
    /// 窗口覆盖的网格比已占用的网格还多时，直接扫描全部范围。
    pub fn query_window(&self, window: &Extent) -> Vec<FeatureId> {
        let mut result: Vec<FeatureId> = if self.cell_count(window) > self.grid.len() as u128 {
            self.extents
                .iter()
                .filter(|(_, e)| e.overlaps(window))
                .map(|(id, _)| *id)
                .collect()
        } else {
            let mut seen = HashSet::new();
            self.cells_for(window)
                .filter_map(|cell| self.grid.get(&cell))
                .flatten()
                .chain(&self.oversized)
                .filter(|id| seen.insert(**id))
                .filter(|id| self.extents.get(*id).is_some_and(|e| e.overlaps(window)))
                .copied()
                .collect()
        };

        result.sort();
        result
    }

    /// 范围包含该点的全部要素
    pub fn query_point(&self, point: &Point2) -> Vec<FeatureId> {
        let cell = self.to_grid_coord(point.x, point.y);

        let mut result: Vec<FeatureId> = self
            .grid
            .get(&cell)
            .into_iter()
            .flatten()
            .chain(&self.oversized)
            .filter(|id| self.extents.get(*id).is_some_and(|e| e.contains(point)))
            .copied()
            .collect();

        result.sort();
        result
    }

    pub fn extent(&self, id: FeatureId) -> Option<&Extent> {
        self.extents.get(&id)
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.extents.clear();
        self.oversized.clear();
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(100.0)
    }
}
