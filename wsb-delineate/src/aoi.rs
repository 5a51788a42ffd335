//! Area of interest handling

use geo::{BoundingRect, MultiPolygon, Polygon, Rect};
use std::path::{Path, PathBuf};
use wsb_core::vector::read_polygons;
use wsb_core::{BasinError, Crs, Result};

/// Polygon area that bounds the DEM request.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    geometry: MultiPolygon<f64>,
    crs: Crs,
}

impl AreaOfInterest {
    pub fn new(geometry: MultiPolygon<f64>, crs: Crs) -> Result<Self> {
        if geometry.0.is_empty() {
            return Err(BasinError::Input("area of interest has no polygons".into()));
        }
        Ok(Self { geometry, crs })
    }

    pub fn from_polygon(polygon: Polygon<f64>, crs: Crs) -> Self {
        Self {
            geometry: MultiPolygon::new(vec![polygon]),
            crs,
        }
    }

    /// Load an AOI from GeoJSON. Files without a `crs` member are taken as
    /// EPSG:4326.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let read = read_polygons(path)?;
        let crs = read.crs.unwrap_or_else(|| {
            log::debug!("{} has no CRS, assuming EPSG:4326", path.display());
            Crs::wgs84()
        });
        Self::new(read.geometry, crs)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn bbox(&self) -> Result<Rect<f64>> {
        self.geometry
            .bounding_rect()
            .ok_or_else(|| BasinError::Input("area of interest has no extent".into()))
    }
}

/// An AOI given directly or as a GeoJSON path.
#[derive(Debug, Clone)]
pub enum AoiInput {
    Geometry(AreaOfInterest),
    Path(PathBuf),
}

impl AoiInput {
    pub fn resolve(self) -> Result<AreaOfInterest> {
        match self {
            AoiInput::Geometry(aoi) => Ok(aoi),
            AoiInput::Path(path) => AreaOfInterest::from_file(path),
        }
    }
}

impl From<AreaOfInterest> for AoiInput {
    fn from(aoi: AreaOfInterest) -> Self {
        AoiInput::Geometry(aoi)
    }
}

impl From<PathBuf> for AoiInput {
    fn from(path: PathBuf) -> Self {
        AoiInput::Path(path)
    }
}

impl From<&Path> for AoiInput {
    fn from(path: &Path) -> Self {
        AoiInput::Path(path.to_path_buf())
    }
}
