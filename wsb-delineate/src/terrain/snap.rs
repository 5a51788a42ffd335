//! Moving a pour point onto the drainage network.

use super::SnapMode;
use wsb_core::{BasinError, Raster, Result};

/// Metres per degree of latitude, used to turn the snap radius into degrees
/// on geographic grids.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Cell `(row, col)` the outlet at `(x, y)` snaps to.
///
/// `grid` is the stream raster for [`SnapMode::Streams`] and the flow
/// accumulation raster for [`SnapMode::FlowAccumulation`]. When nothing
/// qualifies within `distance_m` the outlet stays in its own cell.
pub fn snap_pour_point(
    x: f64,
    y: f64,
    grid: &Raster,
    mode: SnapMode,
    distance_m: f64,
) -> Result<(usize, usize)> {
    let gt = grid.transform();
    let (col_f, row_f) = gt.geo_to_pixel(x, y);
    if col_f < 0.0 || row_f < 0.0 || col_f >= grid.cols() as f64 || row_f >= grid.rows() as f64 {
        return Err(BasinError::Input(format!(
            "pour point ({}, {}) lies outside the flow grid",
            x, y
        )));
    }
    let origin = (row_f as usize, col_f as usize);

    let radius = match grid.crs() {
        Some(crs) if crs.is_geographic() => distance_m / METRES_PER_DEGREE,
        _ => distance_m,
    };
    let reach = (radius / grid.cell_size()).ceil() as usize;
    let row_lo = origin.0.saturating_sub(reach);
    let col_lo = origin.1.saturating_sub(reach);
    let row_hi = (origin.0 + reach).min(grid.rows() - 1);
    let col_hi = (origin.1 + reach).min(grid.cols() - 1);

    // (score, row, col); lower distance or higher accumulation wins
    let mut best: Option<(f64, usize, usize)> = None;
    for row in row_lo..=row_hi {
        for col in col_lo..=col_hi {
            let Some(value) = grid.get(row, col).filter(|v| !grid.is_nodata(*v)) else {
                continue;
            };
            let (cx, cy) = gt.pixel_to_geo(col, row);
            let dist = ((cx - x).powi(2) + (cy - y).powi(2)).sqrt();
            if dist > radius {
                continue;
            }
            let score = match mode {
                SnapMode::Streams if value > 0.0 => dist,
                SnapMode::Streams => continue,
                SnapMode::FlowAccumulation => -value,
            };
            if best.map_or(true, |(s, _, _)| score < s) {
                best = Some((score, row, col));
            }
        }
    }

    match best {
        Some((_, row, col)) => Ok((row, col)),
        None => {
            log::warn!(
                "no {:?} cell within {} m of the pour point, keeping it in place",
                mode,
                distance_m
            );
            Ok(origin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsb_core::{Crs, GeoTransform};

    fn grid(crs: Crs, cell: f64) -> Raster {
        // 10x10 with a stream down column 6 and accumulation growing southwards
        let mut raster = Raster::filled(10, 10, 0.0).with_georef(
            GeoTransform::new(0.0, 10.0 * cell, cell, -cell),
            Some(crs),
        );
        for row in 0..10 {
            raster.set(row, 6, 1.0 + row as f64).unwrap();
        }
        raster
    }

    #[test]
    fn test_snaps_to_nearest_stream() {
        let raster = grid(Crs::utm(10, true), 30.0);
        // centre of cell (4, 4), stream two cells east
        let cell = snap_pour_point(135.0, 165.0, &raster, SnapMode::Streams, 100.0).unwrap();
        assert_eq!(cell, (4, 6));
    }

    #[test]
    fn test_stream_out_of_reach_keeps_origin() {
        let raster = grid(Crs::utm(10, true), 30.0);
        let cell = snap_pour_point(15.0, 285.0, &raster, SnapMode::Streams, 50.0).unwrap();
        assert_eq!(cell, (0, 0));
    }

    #[test]
    fn test_flow_accumulation_picks_maximum() {
        let raster = grid(Crs::utm(10, true), 30.0);
        let cell =
            snap_pour_point(195.0, 165.0, &raster, SnapMode::FlowAccumulation, 70.0).unwrap();
        // (6, 6) has accumulation 7 and sits 60 m south
        assert_eq!(cell, (6, 6));
    }

    #[test]
    fn test_geographic_radius_in_degrees() {
        let raster = grid(Crs::wgs84(), 0.001);
        // 250 m is about 0.0022 degrees, just over two cells
        let cell = snap_pour_point(0.0045, 0.0055, &raster, SnapMode::Streams, 250.0).unwrap();
        assert_eq!(cell, (4, 6));
        let stay = snap_pour_point(0.0045, 0.0055, &raster, SnapMode::Streams, 50.0).unwrap();
        assert_eq!(stay, (4, 4));
    }

    #[test]
    fn test_outside_grid_is_input_error() {
        let raster = grid(Crs::utm(10, true), 30.0);
        assert!(matches!(
            snap_pour_point(-5.0, 10.0, &raster, SnapMode::Streams, 100.0),
            Err(BasinError::Input(_))
        ));
    }
}
