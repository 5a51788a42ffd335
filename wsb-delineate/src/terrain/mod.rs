//! Terrain toolchain seam.
//!
//! Flow routing, stream extraction and watershed rasterisation happen in an
//! external toolchain. The request and artifact types here own every file
//! name the pipeline writes into its output directory.

mod snap;
mod whitebox;

pub use snap::snap_pour_point;
pub use whitebox::WhiteboxToolchain;

use crate::pour_point::PourPoint;
use geo::Rect;
use std::path::{Path, PathBuf};
use wsb_core::raster::read_geotiff;
use wsb_core::{BasinError, Crs, Result};

pub const BREACHED_DEM: &str = "dem_breached.tif";
pub const D8_POINTER: &str = "d8_pntr.tif";
pub const FLOW_ACCUMULATION: &str = "d8_flow_acc.tif";
pub const STREAMS_RASTER: &str = "streams.tif";
pub const STREAMS_VECTOR: &str = "streams.shp";
pub const POUR_POINT_RASTER: &str = "pour_point.tif";
pub const WATERSHED_RASTER: &str = "watershed.tif";

/// How a pour point is moved onto the drainage network before the
/// watershed is traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapMode {
    /// Nearest stream cell
    #[default]
    Streams,
    /// Highest flow accumulation cell
    FlowAccumulation,
}

/// Fixed hydrologic parameters handed to the toolchain.
#[derive(Debug, Clone, PartialEq)]
pub struct HydroParams {
    /// Flow accumulation (cells) at which a cell becomes a stream
    pub stream_threshold: f64,
    /// Maximum breach channel length, in cells
    pub breach_distance: usize,
    /// Stream burn distance, in cells
    pub burn_distance: usize,
    pub snap_mode: SnapMode,
    /// Snap search radius in metres
    pub snap_distance: f64,
    pub threads: usize,
    pub verbose: bool,
}

impl Default for HydroParams {
    fn default() -> Self {
        Self {
            stream_threshold: 1000.0,
            breach_distance: 10,
            burn_distance: 10,
            snap_mode: SnapMode::Streams,
            snap_distance: 100.0,
            threads: num_cpus::get().saturating_sub(1).max(1),
            verbose: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareRequest {
    pub dem: PathBuf,
    pub out_dir: PathBuf,
    pub params: HydroParams,
}

/// Flow direction, accumulation and stream rasters for one DEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowArtifacts {
    pub breached_dem: PathBuf,
    pub d8_pointer: PathBuf,
    pub flow_accumulation: PathBuf,
    pub streams: PathBuf,
}

impl FlowArtifacts {
    /// Artifact locations inside an output directory
    pub fn in_dir(out_dir: &Path) -> Self {
        Self {
            breached_dem: out_dir.join(BREACHED_DEM),
            d8_pointer: out_dir.join(D8_POINTER),
            flow_accumulation: out_dir.join(FLOW_ACCUMULATION),
            streams: out_dir.join(STREAMS_RASTER),
        }
    }

    /// Fail with `ExternalTool` naming the first missing raster.
    pub fn verify(&self, tool: &str) -> Result<()> {
        for path in [
            &self.breached_dem,
            &self.d8_pointer,
            &self.flow_accumulation,
            &self.streams,
        ] {
            require_file(tool, path)?;
        }
        Ok(())
    }
}

/// Vectorised stream network plus the grid it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamNetwork {
    pub vector_path: PathBuf,
    pub crs: Option<Crs>,
    pub extent: Rect<f64>,
}

impl StreamNetwork {
    /// Network metadata taken from the stream raster's georeferencing.
    pub fn from_stream_raster(vector_path: PathBuf, streams: &Path) -> Result<Self> {
        let raster = read_geotiff(streams)?;
        Ok(Self {
            vector_path,
            crs: raster.crs().copied(),
            extent: raster.extent(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WatershedRequest<'a> {
    pub artifacts: &'a FlowArtifacts,
    pub pour_point: &'a PourPoint,
    pub out_dir: &'a Path,
    pub params: &'a HydroParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatershedArtifact {
    pub raster: PathBuf,
}

/// External terrain analysis.
pub trait TerrainToolchain {
    /// Breach depressions, then derive D8 pointer, flow accumulation and streams.
    fn prepare(&self, request: &PrepareRequest) -> Result<FlowArtifacts>;

    /// Vectorise the stream raster.
    fn streams_to_vector(
        &self,
        artifacts: &FlowArtifacts,
        params: &HydroParams,
    ) -> Result<StreamNetwork>;

    /// Rasterise the watershed draining to the pour point.
    fn watershed(&self, request: &WatershedRequest<'_>) -> Result<WatershedArtifact>;
}

pub(crate) fn require_file(tool: &str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BasinError::ExternalTool {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_params() {
        let params = HydroParams::default();
        assert_eq!(params.stream_threshold, 1000.0);
        assert_eq!(params.breach_distance, 10);
        assert_eq!(params.burn_distance, 10);
        assert_eq!(params.snap_distance, 100.0);
        assert_eq!(params.snap_mode, SnapMode::Streams);
        assert!(params.threads >= 1);
    }

    #[test]
    fn test_verify_names_missing_raster() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = FlowArtifacts::in_dir(dir.path());
        for path in [&artifacts.breached_dem, &artifacts.d8_pointer, &artifacts.streams] {
            fs::write(path, b"x").unwrap();
        }
        match artifacts.verify("D8FlowAccumulation") {
            Err(BasinError::ExternalTool { tool, path }) => {
                assert_eq!(tool, "D8FlowAccumulation");
                assert!(path.ends_with(FLOW_ACCUMULATION));
            }
            other => panic!("unexpected {:?}", other),
        }
        fs::write(&artifacts.flow_accumulation, b"x").unwrap();
        assert!(artifacts.verify("toolchain").is_ok());
    }
}
