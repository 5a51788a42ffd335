//! Pure-Rust reprojection between WGS84 geographic, Web Mercator and UTM.
//!
//! UTM follows Snyder 1987 (USGS Prof. Paper 1395, pp. 61-64). Geographic
//! datums other than WGS84 (NAD83, ETRS89, GDA94) are treated as WGS84; the
//! datum shift between them is below a metre, well under a climate grid cell.

use crate::crs::Crs;
use crate::error::{BasinError, Result};
use geo::{Coord, MapCoords, Rect};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Projection {
    Geographic,
    WebMercator,
    Utm { zone: u32, north: bool },
}

impl Projection {
    fn for_crs(crs: &Crs) -> Result<Self> {
        if crs.is_geographic() {
            return Ok(Projection::Geographic);
        }
        if crs.epsg() == 3857 {
            return Ok(Projection::WebMercator);
        }
        parse_utm_epsg(crs.epsg())
            .map(|(zone, north)| Projection::Utm { zone, north })
            .ok_or_else(|| BasinError::UnsupportedCrs(crs.identifier()))
    }

    fn to_lon_lat(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => web_mercator_to_wgs84(x, y),
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_lon_lat(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => wgs84_to_web_mercator(lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Point transformation between two supported CRS.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    from: Projection,
    to: Projection,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        Ok(Self {
            from: Projection::for_crs(from)?,
            to: Projection::for_crs(to)?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.from.to_lon_lat(x, y);
        self.to.from_lon_lat(lon, lat)
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Coord<f64> {
        let (x, y) = self.transform(coord.x, coord.y);
        Coord { x, y }
    }
}

/// Reproject any `geo` geometry from one CRS to another.
///
/// Equivalent CRS short-circuit to a clone, so unsupported codes are only an
/// error when a real transformation is needed.
pub fn reproject<G>(geometry: &G, from: &Crs, to: &Crs) -> Result<G>
where
    G: MapCoords<f64, f64, Output = G> + Clone,
{
    if from.is_equivalent(to) {
        return Ok(geometry.clone());
    }
    let transformer = Transformer::new(from, to)?;
    Ok(geometry.map_coords(|c| transformer.transform_coord(c)))
}

/// Reproject a bounding box, returning the envelope of its four transformed corners.
pub fn reproject_rect(rect: &Rect<f64>, from: &Crs, to: &Crs) -> Result<Rect<f64>> {
    if from.is_equivalent(to) {
        return Ok(*rect);
    }
    let transformer = Transformer::new(from, to)?;
    let (min, max) = (rect.min(), rect.max());
    let corners = [
        (min.x, min.y),
        (min.x, max.y),
        (max.x, min.y),
        (max.x, max.y),
    ];

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for &(x, y) in &corners {
        let (tx, ty) = transformer.transform(x, y);
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }
    Ok(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

// ── Web Mercator (spherical) ─────────────────────────────────────────────

fn wgs84_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let x = A * lon_deg.to_radians();
    let y = A * (std::f64::consts::FRAC_PI_4 + lat_deg.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

// ── UTM (Snyder 1987) ────────────────────────────────────────────────────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };
    (easting, northing)
}

/// Inverse of [`wgs84_to_utm`] via the footpoint latitude (Snyder eq. 8-18 to 8-25).
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_one_minus = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_one_minus) / (1.0 + sqrt_one_minus);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::{point, Point};

    #[test]
    fn parse_utm_codes() {
        assert_eq!(parse_utm_epsg(32630), Some((30, true)));
        assert_eq!(parse_utm_epsg(32721), Some((21, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // pyproj: Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_abs_diff_eq!(e, 440_298.94, epsilon = 1.0);
        assert_abs_diff_eq!(n, 4_474_257.31, epsilon = 1.0);
    }

    #[test]
    fn utm_inverse_recovers_lon_lat() {
        for &(lon, lat, zone, north) in &[
            (-3.7037, 40.4168, 30, true),
            (-58.3816, -34.6037, 21, false),
            (-122.4, 45.5, 10, true),
        ] {
            let (e, n) = wgs84_to_utm(lon, lat, zone, north);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone, north);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-6);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-6);
        }
    }

    #[test]
    fn web_mercator_known_value() {
        // 180° of longitude is half the Web Mercator world width
        let (x, y) = wgs84_to_web_mercator(180.0, 0.0);
        assert_abs_diff_eq!(x, 20_037_508.34, epsilon = 0.01);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
        let (lon, lat) = web_mercator_to_wgs84(-13_625_000.0, 5_700_000.0);
        let (x2, y2) = wgs84_to_web_mercator(lon, lat);
        assert_abs_diff_eq!(x2, -13_625_000.0, epsilon = 1e-4);
        assert_abs_diff_eq!(y2, 5_700_000.0, epsilon = 1e-4);
    }

    #[test]
    fn reproject_point_between_projected_systems() {
        let p: Point<f64> = point!(x: -122.4, y: 45.5);
        let utm = reproject(&p, &Crs::wgs84(), &Crs::utm(10, true)).unwrap();
        let merc = reproject(&utm, &Crs::utm(10, true), &Crs::web_mercator()).unwrap();
        let back = reproject(&merc, &Crs::web_mercator(), &Crs::wgs84()).unwrap();
        assert_abs_diff_eq!(back.x(), -122.4, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y(), 45.5, epsilon = 1e-6);
    }

    #[test]
    fn reproject_same_crs_is_noop_even_if_unsupported() {
        let p: Point<f64> = point!(x: 1.0, y: 2.0);
        let out = reproject(&p, &Crs::from_epsg(2056), &Crs::from_epsg(2056)).unwrap();
        assert_eq!(out, p);
        assert!(reproject(&p, &Crs::from_epsg(2056), &Crs::wgs84()).is_err());
    }

    #[test]
    fn reproject_rect_envelope() {
        let rect = Rect::new(Coord { x: -3.75, y: 40.40 }, Coord { x: -3.70, y: 40.45 });
        let out = reproject_rect(&rect, &Crs::wgs84(), &Crs::utm(30, true)).unwrap();
        let width = out.max().x - out.min().x;
        let height = out.max().y - out.min().y;
        assert!(width > 3_000.0 && width < 6_000.0, "width ~4km, got {width}");
        assert!(height > 4_000.0 && height < 7_000.0, "height ~5.5km, got {height}");
    }
}
