//! Basin masks over a raster grid.

use crate::raster::Raster;
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use ndarray::Array2;

/// Cells of a grid whose centre falls inside a basin geometry.
///
/// The geometry must already be in the grid's CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinMask {
    inside: Array2<bool>,
}

impl BasinMask {
    pub fn new(grid: &Raster, basin: &MultiPolygon<f64>) -> Self {
        let (rows, cols) = grid.shape();
        let mut inside = Array2::from_elem((rows, cols), false);
        let Some(bbox) = basin.bounding_rect() else {
            return Self { inside };
        };
        if let Some((row0, col0, n_rows, n_cols)) = grid.window_for(&bbox) {
            let gt = grid.transform();
            for row in row0..row0 + n_rows {
                for col in col0..col0 + n_cols {
                    let (x, y) = gt.pixel_to_geo(col, row);
                    inside[(row, col)] = basin.contains(&Point::new(x, y));
                }
            }
        }
        Self { inside }
    }

    pub fn is_inside(&self, row: usize, col: usize) -> bool {
        self.inside.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of cells inside the basin
    pub fn count(&self) -> usize {
        self.inside.iter().filter(|&&b| b).count()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inside.dim()
    }

    /// Iterate `(row, col)` of every inside cell
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.inside
            .indexed_iter()
            .filter(|(_, &b)| b)
            .map(|((row, col), _)| (row, col))
    }
}
