//! Per-row cell surface areas.
//!
//! On a geographic grid a cell's area shrinks towards the poles, so the area
//! is computed once per row (latitude band) on the WGS84 ellipsoid. Projected
//! grids get the constant `|dx * dy|` for every row.

use crate::error::{BasinError, Result};
use crate::raster::Raster;

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;

/// Cell areas in m², one value per grid row.
#[derive(Debug, Clone, PartialEq)]
pub struct CellAreaGrid {
    row_areas: Vec<f64>,
}

impl CellAreaGrid {
    /// Derive the area grid from a raster's transform and CRS.
    ///
    /// A raster without a CRS has no defined surface area and is rejected.
    pub fn for_raster(raster: &Raster) -> Result<Self> {
        let crs = raster
            .crs()
            .ok_or_else(|| BasinError::Input("grid has no CRS; cell areas are undefined".into()))?;
        let gt = raster.transform();
        let row_areas = if crs.is_geographic() {
            (0..raster.rows())
                .map(|row| {
                    let (top, bottom) = gt.row_edges(row);
                    band_area(top, bottom, gt.pixel_width.abs())
                })
                .collect()
        } else {
            vec![(gt.pixel_width * gt.pixel_height).abs(); raster.rows()]
        };
        Ok(Self { row_areas })
    }

    /// Area in m² of any cell in `row`
    pub fn area(&self, row: usize) -> f64 {
        self.row_areas.get(row).copied().unwrap_or(0.0)
    }

    pub fn rows(&self) -> usize {
        self.row_areas.len()
    }

    pub fn row_areas(&self) -> &[f64] {
        &self.row_areas
    }
}

/// Area of the ellipsoidal quadrangle spanning `d_lon_deg` degrees of
/// longitude between two latitudes (degrees), using the authalic
/// latitude integral.
fn band_area(lat_a_deg: f64, lat_b_deg: f64, d_lon_deg: f64) -> f64 {
    let e2 = 2.0 * F - F * F;
    let e = e2.sqrt();
    let b2 = A * A * (1.0 - e2);
    let q = |lat_deg: f64| {
        let s = lat_deg.clamp(-90.0, 90.0).to_radians().sin();
        s / (1.0 - e2 * s * s) + (1.0 / (2.0 * e)) * ((1.0 + e * s) / (1.0 - e * s)).ln()
    };
    (b2 * d_lon_deg.to_radians() / 2.0 * (q(lat_a_deg) - q(lat_b_deg))).abs()
}
