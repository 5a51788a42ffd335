//! Main Raster type

use crate::crs::Crs;
use crate::error::{BasinError, Result};
use crate::raster::GeoTransform;
use geo::{Coord, Rect};
use ndarray::{s, Array2};

/// A georeferenced 2D grid of `f64` cells.
///
/// Elevation, flow, watershed and climate layers all travel as `Raster`.
/// Cells equal to `nodata`, and NaN cells, are treated as missing.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Raster data stored in row-major order (row, col)
    data: Array2<f64>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

impl Raster {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(BasinError::Raster(format!(
                "{} values cannot fill a {}x{} grid",
                data.len(),
                rows,
                cols
            )));
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| BasinError::Raster(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<f64>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Builder-style georeferencing
    pub fn with_georef(mut self, transform: GeoTransform, crs: Option<Crs>) -> Self {
        self.transform = transform;
        self.crs = crs;
        self
    }

    /// Builder-style no-data value
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied()
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self.data.get_mut((row, col)).ok_or_else(|| {
            BasinError::Raster(format!(
                "index ({}, {}) out of bounds for {}x{} grid",
                row, col, rows, cols
            ))
        })?;
        *cell = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Whether a cell value counts as missing
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Whether cell (row, col) exists and holds data
    pub fn is_valid_at(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some_and(|v| !self.is_nodata(v))
    }

    /// Cell width in map units
    pub fn cell_size(&self) -> f64 {
        self.transform.pixel_width.abs()
    }

    /// Map extent of the grid
    pub fn extent(&self) -> Rect<f64> {
        let (min_x, min_y, max_x, max_y) = self.transform.bounds(self.cols(), self.rows());
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    /// Row/column window `(row0, col0, rows, cols)` of cells whose extent
    /// intersects `rect`, or `None` if the rectangle misses the grid.
    pub fn window_for(&self, rect: &Rect<f64>) -> Option<(usize, usize, usize, usize)> {
        let (c_a, r_a) = self.transform.geo_to_pixel(rect.min().x, rect.min().y);
        let (c_b, r_b) = self.transform.geo_to_pixel(rect.max().x, rect.max().y);
        let col_lo = c_a.min(c_b).floor().max(0.0);
        let row_lo = r_a.min(r_b).floor().max(0.0);
        let col_hi = c_a.max(c_b).ceil().min(self.cols() as f64);
        let row_hi = r_a.max(r_b).ceil().min(self.rows() as f64);
        if !(col_lo < col_hi && row_lo < row_hi) {
            return None;
        }
        let (row0, col0) = (row_lo as usize, col_lo as usize);
        Some((row0, col0, row_hi as usize - row0, col_hi as usize - col0))
    }

    /// Copy a window of this raster into a new, correctly georeferenced raster
    pub fn crop(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> Result<Raster> {
        if row0 + rows > self.rows() || col0 + cols > self.cols() {
            return Err(BasinError::Raster(format!(
                "window {}x{} at ({}, {}) exceeds {}x{} grid",
                rows,
                cols,
                row0,
                col0,
                self.rows(),
                self.cols()
            )));
        }
        let data = self
            .data
            .slice(s![row0..row0 + rows, col0..col0 + cols])
            .to_owned();
        let (origin_x, origin_y) = self.transform.pixel_to_geo_corner(col0 as f64, row0 as f64);
        let transform = GeoTransform::new(
            origin_x,
            origin_y,
            self.transform.pixel_width,
            self.transform.pixel_height,
        );
        Ok(Raster::from_array(data)
            .with_georef(transform, self.crs)
            .with_nodata(self.nodata))
    }
}
