use geo::{point, polygon, Area, BoundingRect, Centroid, Contains, Point};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use wsb_core::raster::{read_geotiff, write_geotiff};
use wsb_core::vector::{read_point, read_polygons, write_point};
use wsb_core::{BasinError, Crs, GeoTransform, Raster, Result};
use wsb_delineate::{
    AreaOfInterest, DelineationConfig, Delineator, DemProvider, FlowArtifacts, HydroParams,
    PointPicker, PourPoint, PourPointSource, PrepareRequest, StreamNetwork, TerrainToolchain,
    WatershedArtifact, WatershedRequest,
};

const CELL: f64 = 100.0;
const ORIGIN_X: f64 = 495_000.0;
const ORIGIN_Y: f64 = 4_105_000.0;

fn grid() -> Raster {
    Raster::filled(100, 100, 0.0).with_georef(
        GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL, -CELL),
        Some(Crs::utm(10, true)),
    )
}

/// 10 km square in UTM zone 10N
fn square_aoi() -> AreaOfInterest {
    AreaOfInterest::from_polygon(
        polygon![
            (x: 495_000.0, y: 4_095_000.0),
            (x: 505_000.0, y: 4_095_000.0),
            (x: 505_000.0, y: 4_105_000.0),
            (x: 495_000.0, y: 4_105_000.0),
        ],
        Crs::utm(10, true),
    )
}

#[derive(Default)]
struct FakeDem {
    fetches: Cell<usize>,
}

impl DemProvider for FakeDem {
    fn fetch(&self, _aoi: &AreaOfInterest, _tier: u8, dest: &Path) -> Result<()> {
        self.fetches.set(self.fetches.get() + 1);
        write_geotiff(&grid(), dest)
    }
}

/// Writes plausible rasters; the watershed is every cell within 3 km of
/// the outlet.
#[derive(Default)]
struct FakeToolchain {
    prepares: Cell<usize>,
    skip_accumulation: bool,
}

impl TerrainToolchain for FakeToolchain {
    fn prepare(&self, request: &PrepareRequest) -> Result<FlowArtifacts> {
        self.prepares.set(self.prepares.get() + 1);
        let artifacts = FlowArtifacts::in_dir(&request.out_dir);
        let dem = read_geotiff(&request.dem)?;
        write_geotiff(&dem, &artifacts.breached_dem)?;
        write_geotiff(&dem, &artifacts.d8_pointer)?;
        if !self.skip_accumulation {
            write_geotiff(&dem, &artifacts.flow_accumulation)?;
        }
        let mut streams = dem.clone();
        for row in 0..streams.rows() {
            streams.set(row, 50, 1.0)?;
        }
        write_geotiff(&streams, &artifacts.streams)?;
        Ok(artifacts)
    }

    fn streams_to_vector(
        &self,
        artifacts: &FlowArtifacts,
        _params: &HydroParams,
    ) -> Result<StreamNetwork> {
        let vector_path = artifacts.streams.with_file_name("streams.shp");
        fs::write(&vector_path, b"")?;
        StreamNetwork::from_stream_raster(vector_path, &artifacts.streams)
    }

    fn watershed(&self, request: &WatershedRequest<'_>) -> Result<WatershedArtifact> {
        let pointer = read_geotiff(&request.artifacts.d8_pointer)?;
        let outlet = request.pour_point.geometry;
        let mut shed = pointer.clone().with_nodata(Some(-9999.0));
        for row in 0..shed.rows() {
            for col in 0..shed.cols() {
                let (x, y) = pointer.transform().pixel_to_geo(col, row);
                let near = (x - outlet.x()).hypot(y - outlet.y()) <= 3_000.0;
                shed.set(row, col, if near { 1.0 } else { -9999.0 })?;
            }
        }
        let raster = request.out_dir.join("watershed.tif");
        write_geotiff(&shed, &raster)?;
        Ok(WatershedArtifact { raster })
    }
}

struct CancellingPicker;

impl PointPicker for CancellingPicker {
    fn pick(&mut self, _network: &StreamNetwork) -> Result<Option<Point<f64>>> {
        Ok(None)
    }
}

fn centroid_source() -> PourPointSource {
    let centre = square_aoi().geometry().centroid().unwrap();
    PourPointSource::Explicit(PourPoint::new(centre, Some(Crs::utm(10, true))))
}

#[test]
fn test_square_aoi_with_centroid_outlet() {
    let dir = tempfile::tempdir().unwrap();
    let config = DelineationConfig::new(dir.path().join("run")).quiet(true);
    let (dem, toolchain) = (FakeDem::default(), FakeToolchain::default());

    let basin = Delineator::new(&dem, &toolchain)
        .delineate_basin(square_aoi(), &config, centroid_source())
        .unwrap();

    let aoi_area = square_aoi().geometry().unsigned_area();
    assert_eq!(basin.geometry.0.len(), 1);
    assert!(basin.area() > 0.0);
    assert!(basin.area() <= aoi_area);
    assert_eq!(basin.crs, Some(Crs::utm(10, true)));

    let written = read_polygons(&basin.path).unwrap();
    assert_eq!(written.geometry, basin.geometry);
    assert_eq!(written.crs, Some(Crs::utm(10, true)));
    assert!(config.out_dir.join("pour_point.geojson").is_file());
    assert!(config.out_dir.join("dem_z12.tif").is_file());
}

#[test]
fn test_rerun_reuses_dem_but_regenerates_rasters() {
    let dir = tempfile::tempdir().unwrap();
    let config = DelineationConfig::new(dir.path()).quiet(true);
    let (dem, toolchain) = (FakeDem::default(), FakeToolchain::default());
    let delineator = Delineator::new(&dem, &toolchain);

    delineator
        .delineate_basin(square_aoi(), &config, centroid_source())
        .unwrap();
    fs::remove_file(dir.path().join("watershed.tif")).unwrap();
    delineator
        .delineate_basin(square_aoi(), &config, centroid_source())
        .unwrap();

    assert_eq!(dem.fetches.get(), 1);
    assert_eq!(toolchain.prepares.get(), 2);
    assert!(dir.path().join("watershed.tif").is_file());
}

#[test]
fn test_pour_point_file_in_other_crs() {
    let dir = tempfile::tempdir().unwrap();
    let outlet_file = dir.path().join("outlet.geojson");
    // lon/lat of roughly (500000, 4099310) in UTM 10N
    write_point(
        &outlet_file,
        &PourPoint::new(point!(x: -123.0, y: 37.04), Some(Crs::wgs84())),
    )
    .unwrap();
    let config = DelineationConfig::new(dir.path().join("run")).quiet(true);
    let (dem, toolchain) = (FakeDem::default(), FakeToolchain::default());

    let basin = Delineator::new(&dem, &toolchain)
        .delineate_basin(square_aoi(), &config, PourPointSource::FromFile(outlet_file))
        .unwrap();

    let persisted = read_point(config.out_dir.join("pour_point.geojson")).unwrap();
    assert_eq!(persisted.crs, Some(Crs::utm(10, true)));
    let extent = grid().extent();
    assert!(extent.contains(&persisted.geometry));
    let bbox = basin.geometry.bounding_rect().unwrap();
    assert!(bbox.min().x >= extent.min().x && bbox.max().y <= extent.max().y);
}

#[test]
fn test_cancelled_pick_is_no_pour_point() {
    let dir = tempfile::tempdir().unwrap();
    let config = DelineationConfig::new(dir.path()).quiet(true);
    let (dem, toolchain) = (FakeDem::default(), FakeToolchain::default());

    let err = Delineator::new(&dem, &toolchain)
        .delineate_basin(
            square_aoi(),
            &config,
            PourPointSource::Interactive(Box::new(CancellingPicker)),
        )
        .unwrap_err();
    assert!(matches!(err, BasinError::NoPourPoint));
    assert!(!dir.path().join("basin.geojson").exists());
}

#[test]
fn test_missing_flow_raster_is_external_tool_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = DelineationConfig::new(dir.path()).quiet(true);
    let dem = FakeDem::default();
    let toolchain = FakeToolchain {
        skip_accumulation: true,
        ..FakeToolchain::default()
    };

    let err = Delineator::new(&dem, &toolchain)
        .delineate_basin(square_aoi(), &config, centroid_source())
        .unwrap_err();
    match err {
        BasinError::ExternalTool { path, .. } => assert!(path.ends_with("d8_flow_acc.tif")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_aoi_path_that_cannot_be_read() {
    let dir = tempfile::tempdir().unwrap();
    let config = DelineationConfig::new(dir.path()).quiet(true);
    let (dem, toolchain) = (FakeDem::default(), FakeToolchain::default());

    let err = Delineator::new(&dem, &toolchain)
        .delineate_basin(dir.path().join("missing.geojson"), &config, centroid_source())
        .unwrap_err();
    assert!(matches!(err, BasinError::Input(_)));
    assert_eq!(dem.fetches.get(), 0);
}
