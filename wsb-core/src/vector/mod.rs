//! GeoJSON reading and writing for AOIs, pour points and basin boundaries.
//!
//! The CRS travels in the legacy top-level `crs` member,
//! `{"type": "name", "properties": {"name": "EPSG:n"}}`. A file without one
//! is read with no CRS rather than an assumed EPSG:4326.

use crate::crs::Crs;
use crate::error::{BasinError, Result};
use geo::{Geometry, MultiPolygon, Point};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value as GeoValue};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::path::Path;

/// A geometry together with the CRS its coordinates are in, if known.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsGeometry<G> {
    pub geometry: G,
    pub crs: Option<Crs>,
}

impl<G> CrsGeometry<G> {
    pub fn new(geometry: G, crs: Option<Crs>) -> Self {
        Self { geometry, crs }
    }
}

/// Read every polygon in a GeoJSON file into one multi-polygon
pub fn read_polygons<P: AsRef<Path>>(path: P) -> Result<CrsGeometry<MultiPolygon<f64>>> {
    let path = path.as_ref();
    let text = read_text(path)?;
    parse_polygons(&text)
        .map_err(|e| BasinError::Input(format!("{}: {}", path.display(), e)))
}

/// Parse every polygon in a GeoJSON document into one multi-polygon
pub fn parse_polygons(text: &str) -> Result<CrsGeometry<MultiPolygon<f64>>> {
    let (geometries, crs) = parse_geometries(text)?;
    let polygons: Vec<_> = geometries
        .into_iter()
        .flat_map(|g| match g {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(mp) => mp.0,
            _ => vec![],
        })
        .collect();
    if polygons.is_empty() {
        return Err(BasinError::Input("no polygon geometry found".into()));
    }
    Ok(CrsGeometry::new(MultiPolygon::new(polygons), crs))
}

/// Read the first point in a GeoJSON file
pub fn read_point<P: AsRef<Path>>(path: P) -> Result<CrsGeometry<Point<f64>>> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let (geometries, crs) = parse_geometries(&text)
        .map_err(|e| BasinError::Input(format!("{}: {}", path.display(), e)))?;
    geometries
        .into_iter()
        .find_map(|g| match g {
            Geometry::Point(p) => Some(p),
            Geometry::MultiPoint(mp) => mp.0.into_iter().next(),
            _ => None,
        })
        .map(|p| CrsGeometry::new(p, crs))
        .ok_or_else(|| BasinError::Input(format!("{}: no point geometry found", path.display())))
}

/// Write a single-feature point collection, replacing any existing file
pub fn write_point<P: AsRef<Path>>(path: P, point: &CrsGeometry<Point<f64>>) -> Result<()> {
    let value = GeoValue::from(&point.geometry);
    write_feature(path.as_ref(), value, JsonObject::new(), point.crs.as_ref())
}

/// Write a single-feature (multi)polygon collection, replacing any existing file
pub fn write_polygons<P: AsRef<Path>>(
    path: P,
    boundary: &CrsGeometry<MultiPolygon<f64>>,
    properties: JsonObject,
) -> Result<()> {
    let value = GeoValue::from(&boundary.geometry);
    write_feature(path.as_ref(), value, properties, boundary.crs.as_ref())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| BasinError::Input(format!("cannot read {}: {}", path.display(), e)))
}

fn parse_geometries(text: &str) -> Result<(Vec<Geometry<f64>>, Option<Crs>)> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| BasinError::Input(e.to_string()))?;
    let (values, members) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let members = fc.foreign_members;
            let values = fc
                .features
                .into_iter()
                .filter_map(|f| f.geometry.map(|g| g.value))
                .collect::<Vec<_>>();
            (values, members)
        }
        GeoJson::Feature(f) => {
            let members = f.foreign_members;
            (f.geometry.map(|g| g.value).into_iter().collect(), members)
        }
        GeoJson::Geometry(g) => (vec![g.value], g.foreign_members),
    };
    let crs = members.as_ref().map(crs_from_members).transpose()?.flatten();
    let geometries = values
        .into_iter()
        .map(|v| {
            Geometry::<f64>::try_from(v).map_err(|e| BasinError::Input(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((geometries, crs))
}

fn crs_from_members(members: &JsonObject) -> Result<Option<Crs>> {
    let name = members
        .get("crs")
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str);
    name.map(str::parse::<Crs>).transpose()
}

fn write_feature(
    path: &Path,
    value: GeoValue,
    properties: JsonObject,
    crs: Option<&Crs>,
) -> Result<()> {
    let feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };
    let foreign_members = crs.map(|crs| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": crs.identifier()}}),
        );
        members
    });
    let collection = FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members,
    };
    fs::write(path, GeoJson::FeatureCollection(collection).to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Area};

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32610"}},
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
        }]
    }"#;

    #[test]
    fn test_parse_polygons_with_crs() {
        let aoi = parse_polygons(SQUARE).unwrap();
        assert_eq!(aoi.crs, Some(Crs::utm(10, true)));
        assert_eq!(aoi.geometry.unsigned_area(), 100.0);
    }

    #[test]
    fn test_bare_geometry_has_no_crs() {
        let aoi = parse_polygons(
            r#"{"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}"#,
        )
        .unwrap();
        assert_eq!(aoi.crs, None);
        assert_eq!(aoi.geometry.0.len(), 1);
    }

    #[test]
    fn test_no_polygon_is_input_error() {
        let err = parse_polygons(r#"{"type": "Point", "coordinates": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, BasinError::Input(_)));
        assert!(matches!(parse_polygons("not json"), Err(BasinError::Input(_))));
    }

    #[test]
    fn test_point_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pour_point.geojson");
        let point = CrsGeometry::new(point!(x: 500_100.0, y: 4_100_200.0), Some(Crs::utm(10, true)));
        write_point(&path, &point).unwrap();
        // overwrite keeps only the latest point
        let moved = CrsGeometry::new(point!(x: 1.0, y: 2.0), Some(Crs::wgs84()));
        write_point(&path, &moved).unwrap();
        assert_eq!(read_point(&path).unwrap(), moved);
    }

    #[test]
    fn test_write_polygons_single_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basin.geojson");
        let boundary = CrsGeometry::new(
            MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0)]]),
            Some(Crs::utm(11, true)),
        );
        let mut props = JsonObject::new();
        props.insert("area_m2".into(), json!(2.0));
        write_polygons(&path, &boundary, props).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let json: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(json["features"].as_array().unwrap().len(), 1);
        assert_eq!(json["crs"]["properties"]["name"], "EPSG:32611");
        assert_eq!(read_polygons(&path).unwrap().crs, Some(Crs::utm(11, true)));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_point(dir.path().join("nope.geojson")),
            Err(BasinError::Input(_))
        ));
    }
}
