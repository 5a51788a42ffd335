//! Basin delineation pipeline

use crate::aoi::AoiInput;
use crate::dem::{DemCache, DemProvider};
use crate::pour_point::PourPointSource;
use crate::terrain::{HydroParams, PrepareRequest, TerrainToolchain, WatershedRequest};
use geo::{Area, MultiPolygon};
use log::Level;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use wsb_core::raster::{polygonize, read_geotiff};
use wsb_core::vector::{read_polygons, write_point, write_polygons, CrsGeometry};
use wsb_core::{BasinError, Crs, Result};

pub const POUR_POINT_FILE: &str = "pour_point.geojson";
pub const BASIN_FILE: &str = "basin.geojson";

/// Default DEM tier; zoom 12 selects 30 m data.
pub const DEFAULT_DEM_TIER: u8 = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct DelineationConfig {
    pub out_dir: PathBuf,
    pub dem_tier: u8,
    pub params: HydroParams,
    pub quiet: bool,
}

impl DelineationConfig {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.into(),
            dem_tier: DEFAULT_DEM_TIER,
            params: HydroParams::default(),
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self.params.verbose = !quiet;
        self
    }

    fn level(&self) -> Level {
        if self.quiet {
            Level::Debug
        } else {
            Level::Info
        }
    }
}

/// The dissolved watershed outline for one outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinBoundary {
    pub geometry: MultiPolygon<f64>,
    pub crs: Option<Crs>,
    /// Where the boundary was written
    pub path: PathBuf,
}

impl BasinBoundary {
    /// Load a boundary written by an earlier run
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let read = read_polygons(path)?;
        Ok(Self {
            geometry: read.geometry,
            crs: read.crs,
            path: path.to_path_buf(),
        })
    }

    /// Planar area in squared CRS units
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

/// Runs delineation against a DEM source and a terrain toolchain.
pub struct Delineator<'a> {
    dem: &'a dyn DemProvider,
    toolchain: &'a dyn TerrainToolchain,
}

impl<'a> Delineator<'a> {
    pub fn new(dem: &'a dyn DemProvider, toolchain: &'a dyn TerrainToolchain) -> Self {
        Self { dem, toolchain }
    }

    /// Delineate the basin draining to the resolved pour point.
    ///
    /// Every intermediate raster stays in `config.out_dir`. The DEM is only
    /// fetched when `dem_z<tier>.tif` is not already there; flow and
    /// watershed rasters are regenerated on every run.
    pub fn delineate_basin(
        &self,
        aoi: impl Into<AoiInput>,
        config: &DelineationConfig,
        source: PourPointSource,
    ) -> Result<BasinBoundary> {
        let level = config.level();
        let aoi = aoi.into().resolve()?;
        let out_dir = config.out_dir.as_path();
        fs::create_dir_all(out_dir)?;

        let dem = DemCache::new(out_dir, config.dem_tier).get_or_fetch(self.dem, &aoi, level)?;

        log::log!(level, "Deriving flow direction, accumulation and streams");
        let artifacts = self.toolchain.prepare(&PrepareRequest {
            dem,
            out_dir: out_dir.to_path_buf(),
            params: config.params.clone(),
        })?;
        artifacts.verify("terrain toolchain")?;

        log::log!(level, "Vectorising streams");
        let network = self.toolchain.streams_to_vector(&artifacts, &config.params)?;

        let pour_point = source.resolve(&network)?;
        write_point(out_dir.join(POUR_POINT_FILE), &pour_point)?;
        log::log!(
            level,
            "Pour point ({}, {})",
            pour_point.geometry.x(),
            pour_point.geometry.y()
        );

        log::log!(level, "Tracing watershed");
        let watershed = self.toolchain.watershed(&WatershedRequest {
            artifacts: &artifacts,
            pour_point: &pour_point,
            out_dir,
            params: &config.params,
        })?;
        if !watershed.raster.is_file() {
            return Err(BasinError::ExternalTool {
                tool: "terrain toolchain".into(),
                path: watershed.raster,
            });
        }

        let raster = read_geotiff(&watershed.raster)?;
        let crs = raster.crs().copied().or(network.crs);
        let geometry = polygonize(&raster, |v| v != 0.0)?;
        let cells = raster
            .data()
            .indexed_iter()
            .filter(|((r, c), v)| raster.is_valid_at(*r, *c) && **v != 0.0)
            .count();

        let path = out_dir.join(BASIN_FILE);
        let mut properties = serde_json::Map::new();
        properties.insert("cells".to_string(), json!(cells));
        if let Some(crs) = crs.filter(|c| !c.is_geographic()) {
            properties.insert("area_m2".to_string(), json!(geometry.unsigned_area()));
            properties.insert("crs".to_string(), json!(crs.identifier()));
        }
        let boundary = CrsGeometry::new(geometry, crs);
        write_polygons(&path, &boundary, properties)?;
        log::log!(level, "Basin of {} cells written to {}", cells, path.display());

        Ok(BasinBoundary {
            geometry: boundary.geometry,
            crs,
            path,
        })
    }
}
