//! A uniform bucket grid over a two dimensional plane.
//!
//! Points are never stored in the grid, only the indices of the entries they
//! belong to in some caller-owned collection. With the cell size set to the
//! matching tolerance, every point within tolerance of a query lies in the
//! query's cell or one of its eight neighbors, so a radius-one
//! [`SpatialGrid::neighbors`] query replaces a scan of the whole collection.
//!
//! The same structure indexes features in (retention time, m/z) space for
//! clustering, and transformation votes in (shift, scale) space for alignment.

use std::collections::HashMap;

use num_traits::ToPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::IndexType;
use crate::error::ConfigurationError;

/// The integer coordinates of a grid cell, `(floor(x / width), floor(y / height))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The key displaced by `(dx, dy)` cells, or `None` at the edge of the
    /// addressable range
    pub fn offset(&self, dx: i64, dy: i64) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }

    /// The Chebyshev distance between two cells, in cells
    pub fn distance(&self, other: &Self) -> u64 {
        self.x
            .abs_diff(other.x)
            .max(self.y.abs_diff(other.y))
    }
}

/// A mapping from [`CellKey`] to the indices of entries whose point falls
/// in that cell.
///
/// The cell size is fixed at construction. Indices are appended to their
/// bucket in insertion order and never reordered or removed.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_width: f64,
    cell_height: f64,
    cells: HashMap<CellKey, Vec<IndexType>>,
    len: usize,
}

impl SpatialGrid {
    /// Create an empty grid whose cells are `cell_width` by `cell_height`.
    ///
    /// # Errors
    /// [`ConfigurationError::NonPositiveCellSize`] if either dimension is not
    /// a positive, finite number.
    pub fn new(cell_width: f64, cell_height: f64) -> Result<Self, ConfigurationError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(cell_width) || !valid(cell_height) {
            return Err(ConfigurationError::NonPositiveCellSize {
                width: cell_width,
                height: cell_height,
            });
        }
        Ok(Self {
            cell_width,
            cell_height,
            cells: HashMap::new(),
            len: 0,
        })
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    /// The number of indices stored in the grid
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The cell `point` falls in, or `None` if the point is not finite or
    /// lies beyond the addressable range
    pub fn cell_of(&self, point: (f64, f64)) -> Option<CellKey> {
        let (x, y) = point;
        let cx = (x / self.cell_width).floor().to_i64()?;
        let cy = (y / self.cell_height).floor().to_i64()?;
        Some(CellKey::new(cx, cy))
    }

    /// Add `index` to the bucket containing `point`.
    ///
    /// # Errors
    /// [`ConfigurationError::NonFiniteCoordinate`] if either coordinate is NaN or
    /// infinite, [`ConfigurationError::CellOutOfRange`] if the coordinate is so
    /// large relative to the cell size that its cell cannot be addressed.
    pub fn insert(&mut self, index: IndexType, point: (f64, f64)) -> Result<CellKey, ConfigurationError> {
        let (x, y) = point;
        if !x.is_finite() || !y.is_finite() {
            return Err(ConfigurationError::NonFiniteCoordinate { index, x, y });
        }
        let key = self
            .cell_of(point)
            .ok_or(ConfigurationError::CellOutOfRange { x, y })?;
        self.cells.entry(key).or_default().push(index);
        self.len += 1;
        Ok(key)
    }

    /// The indices stored in the cell `key`, in insertion order
    pub fn cell(&self, key: &CellKey) -> &[IndexType] {
        self.cells.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All non-empty cells, in ascending key order
    pub fn occupied_cells(&self) -> Vec<(CellKey, &[IndexType])> {
        let mut cells: Vec<_> = self
            .cells
            .iter()
            .map(|(k, v)| (*k, v.as_slice()))
            .collect();
        cells.sort_by_key(|(k, _)| *k);
        cells
    }

    /// Iterate over every index stored in a cell within `radius_cells` of the cell
    /// containing `point`, including that cell itself.
    ///
    /// Cells are visited in ascending key order. The iterator only reads the grid,
    /// so calling this again produces the same sequence. A non-finite `point`
    /// produces an empty sequence.
    pub fn neighbors(&self, point: (f64, f64), radius_cells: u32) -> Neighbors<'_> {
        Neighbors::new(self, self.cell_of(point), radius_cells)
    }

    /// Like [`SpatialGrid::neighbors`], centered on a cell key
    pub fn neighbors_of_cell(&self, key: CellKey, radius_cells: u32) -> Neighbors<'_> {
        Neighbors::new(self, Some(key), radius_cells)
    }

    /// The number of indices in the `(2r + 1) x (2r + 1)` block of cells centered on `key`
    pub fn neighborhood_count(&self, key: CellKey, radius_cells: u32) -> usize {
        let r = i64::from(radius_cells);
        let mut total = 0;
        for dx in -r..=r {
            for dy in -r..=r {
                if let Some(k) = key.offset(dx, dy) {
                    total += self.cell(&k).len();
                }
            }
        }
        total
    }

    /// Find the occupied cell whose `(2r + 1) x (2r + 1)` neighborhood holds the most
    /// indices.
    ///
    /// Only occupied cells are considered as centers, so the winner always holds
    /// at least one index itself. Ties are broken in favor of the smallest key so
    /// the answer does not depend on hash order.
    pub fn densest_cell(&self, radius_cells: u32) -> Option<(CellKey, usize)> {
        self.cells
            .keys()
            .map(|key| (*key, self.neighborhood_count(*key, radius_cells)))
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then_with(|| kb.cmp(ka)))
    }

    /// Append all the entries of `other` to this grid, cell by cell.
    ///
    /// # Errors
    /// [`ConfigurationError::InvalidParameter`] if the two grids do not share a
    /// cell size.
    pub fn merge(&mut self, other: SpatialGrid) -> Result<(), ConfigurationError> {
        if self.cell_width != other.cell_width || self.cell_height != other.cell_height {
            return Err(ConfigurationError::InvalidParameter {
                name: "cell_width",
                value: other.cell_width,
                reason: "grids with different cell sizes cannot be merged",
            });
        }
        self.len += other.len;
        for (key, members) in other.cells {
            self.cells.entry(key).or_default().extend(members);
        }
        Ok(())
    }
}

/// An iterator over the indices stored near a query cell.
/// See [`SpatialGrid::neighbors`].
#[derive(Debug, Clone)]
pub struct Neighbors<'a> {
    grid: &'a SpatialGrid,
    center: Option<CellKey>,
    radius: i64,
    dx: i64,
    dy: i64,
    current: std::slice::Iter<'a, IndexType>,
}

impl<'a> Neighbors<'a> {
    fn new(grid: &'a SpatialGrid, center: Option<CellKey>, radius_cells: u32) -> Self {
        let radius = i64::from(radius_cells);
        Self {
            grid,
            center,
            radius,
            dx: -radius,
            dy: -radius,
            current: [].iter(),
        }
    }
}

impl Iterator for Neighbors<'_> {
    type Item = IndexType;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(i) = self.current.next() {
                return Some(*i);
            }
            let center = self.center?;
            if self.dx > self.radius {
                return None;
            }
            let key = center.offset(self.dx, self.dy);
            self.dy += 1;
            if self.dy > self.radius {
                self.dy = -self.radius;
                self.dx += 1;
            }
            if let Some(key) = key {
                self.current = self.grid.cell(&key).iter();
            }
        }
    }
}

impl std::iter::FusedIterator for Neighbors<'_> {}
