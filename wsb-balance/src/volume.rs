//! Zonal volume integration

use wsb_core::{BasinMask, CellAreaGrid, Raster};

const MM_PER_M: f64 = 1000.0;

/// Volume in m³ of a depth grid (mm) summed over the masked cells.
///
/// No-data cells inside the basin contribute nothing. `None` when no masked
/// cell holds data, so missing coverage is never mistaken for zero depth.
pub fn zonal_volume(depth_mm: &Raster, mask: &BasinMask, areas: &CellAreaGrid) -> Option<f64> {
    mask.cells()
        .filter_map(|(row, col)| {
            depth_mm
                .get(row, col)
                .filter(|v| !depth_mm.is_nodata(*v))
                .map(|v| v / MM_PER_M * areas.area(row))
        })
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use wsb_core::{Crs, GeoTransform};

    #[test]
    fn test_uniform_depth_over_projected_grid() {
        // 4x4 cells of 1 km², 10 mm each, basin covers the middle 2x2
        let mut depth = Raster::filled(4, 4, 10.0).with_georef(
            GeoTransform::new(0.0, 4000.0, 1000.0, -1000.0),
            Some(Crs::utm(10, true)),
        );
        let basin = MultiPolygon::new(vec![polygon![
            (x: 1000.0, y: 1000.0),
            (x: 3000.0, y: 1000.0),
            (x: 3000.0, y: 3000.0),
            (x: 1000.0, y: 3000.0),
        ]]);
        let mask = BasinMask::new(&depth, &basin);
        let areas = CellAreaGrid::for_raster(&depth).unwrap();
        assert_eq!(zonal_volume(&depth, &mask, &areas), Some(4.0 * 10_000.0));

        depth = depth.with_nodata(Some(-9999.0));
        depth.set(1, 1, -9999.0).unwrap();
        assert_eq!(zonal_volume(&depth, &mask, &areas), Some(3.0 * 10_000.0));
    }

    #[test]
    fn test_no_valid_cells_is_none() {
        let grid = |v: f64| {
            Raster::filled(2, 2, v).with_georef(
                GeoTransform::new(0.0, 2000.0, 1000.0, -1000.0),
                Some(Crs::utm(10, true)),
            )
        };
        let whole = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 2000.0, y: 0.0),
            (x: 2000.0, y: 2000.0),
            (x: 0.0, y: 2000.0),
        ]]);
        let areas = CellAreaGrid::for_raster(&grid(1.0)).unwrap();
        let mask = BasinMask::new(&grid(1.0), &whole);
        assert_eq!(zonal_volume(&grid(f64::NAN), &mask, &areas), None);
        assert_eq!(zonal_volume(&grid(0.0), &mask, &areas), Some(0.0));

        // smaller than a cell and away from every centre
        let sliver = MultiPolygon::new(vec![polygon![
            (x: 100.0, y: 100.0),
            (x: 300.0, y: 100.0),
            (x: 300.0, y: 300.0),
        ]]);
        let mask = BasinMask::new(&grid(1.0), &sliver);
        assert_eq!(mask.count(), 0);
        assert_eq!(zonal_volume(&grid(1.0), &mask, &areas), None);
    }
}
