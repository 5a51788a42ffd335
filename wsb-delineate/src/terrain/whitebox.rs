//! WhiteboxTools adapter, driving the `whitebox_tools` executable.

use super::{
    require_file, snap_pour_point, FlowArtifacts, HydroParams, PrepareRequest, SnapMode,
    StreamNetwork, TerrainToolchain, WatershedArtifact, WatershedRequest, POUR_POINT_RASTER,
    STREAMS_VECTOR, WATERSHED_RASTER,
};
use std::path::{Path, PathBuf};
use std::process::Command;
use wsb_core::raster::{read_geotiff, write_geotiff};
use wsb_core::reproject::Transformer;
use wsb_core::{BasinError, Raster, Result};

pub const DEFAULT_EXECUTABLE: &str = "whitebox_tools";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhiteboxToolchain {
    executable: PathBuf,
}

impl Default for WhiteboxToolchain {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

impl WhiteboxToolchain {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Full argument list for one tool run
    pub fn command_args(
        tool: &str,
        wd: &Path,
        args: &[String],
        params: &HydroParams,
    ) -> Vec<String> {
        let mut all = vec![format!("--run={}", tool), format!("--wd={}", wd.display())];
        all.extend(args.iter().cloned());
        all.push(format!("--max_procs={}", params.threads));
        if params.verbose {
            all.push("-v".to_string());
        }
        all
    }

    fn run(&self, tool: &str, wd: &Path, args: &[String], params: &HydroParams) -> Result<()> {
        let args = Self::command_args(tool, wd, args, params);
        log::debug!("{} {}", self.executable.display(), args.join(" "));
        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| BasinError::ToolFailed {
                tool: tool.to_string(),
                reason: format!("cannot start {}: {}", self.executable.display(), e),
            })?;
        if params.verbose {
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                log::debug!("[{}] {}", tool, line);
            }
        }
        if !output.status.success() {
            return Err(BasinError::ToolFailed {
                tool: tool.to_string(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

fn arg(name: &str, path: &Path) -> String {
    format!("--{}={}", name, path.display())
}

impl TerrainToolchain for WhiteboxToolchain {
    fn prepare(&self, request: &PrepareRequest) -> Result<FlowArtifacts> {
        let params = &request.params;
        let wd = request.out_dir.as_path();
        let artifacts = FlowArtifacts::in_dir(wd);
        log::debug!(
            "stream burn distance {} cells is not applied by WhiteboxTools",
            params.burn_distance
        );

        self.run(
            "BreachDepressionsLeastCost",
            wd,
            &[
                arg("dem", &request.dem),
                arg("output", &artifacts.breached_dem),
                format!("--dist={}", params.breach_distance),
                "--fill".to_string(),
            ],
            params,
        )?;
        require_file("BreachDepressionsLeastCost", &artifacts.breached_dem)?;

        self.run(
            "D8Pointer",
            wd,
            &[
                arg("dem", &artifacts.breached_dem),
                arg("output", &artifacts.d8_pointer),
            ],
            params,
        )?;
        require_file("D8Pointer", &artifacts.d8_pointer)?;

        self.run(
            "D8FlowAccumulation",
            wd,
            &[
                arg("input", &artifacts.d8_pointer),
                arg("output", &artifacts.flow_accumulation),
                "--out_type=cells".to_string(),
                "--pntr".to_string(),
            ],
            params,
        )?;
        require_file("D8FlowAccumulation", &artifacts.flow_accumulation)?;

        self.run(
            "ExtractStreams",
            wd,
            &[
                arg("flow_accum", &artifacts.flow_accumulation),
                arg("output", &artifacts.streams),
                format!("--threshold={}", params.stream_threshold),
                "--zero_background".to_string(),
            ],
            params,
        )?;
        require_file("ExtractStreams", &artifacts.streams)?;

        Ok(artifacts)
    }

    fn streams_to_vector(
        &self,
        artifacts: &FlowArtifacts,
        params: &HydroParams,
    ) -> Result<StreamNetwork> {
        let wd = artifacts
            .streams
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let vector_path = wd.join(STREAMS_VECTOR);
        self.run(
            "RasterStreamsToVector",
            &wd,
            &[
                arg("streams", &artifacts.streams),
                arg("d8_pntr", &artifacts.d8_pointer),
                arg("output", &vector_path),
            ],
            params,
        )?;
        require_file("RasterStreamsToVector", &vector_path)?;
        StreamNetwork::from_stream_raster(vector_path, &artifacts.streams)
    }

    fn watershed(&self, request: &WatershedRequest<'_>) -> Result<WatershedArtifact> {
        let params = request.params;
        let pointer = read_geotiff(&request.artifacts.d8_pointer)?;
        let snap_grid = match params.snap_mode {
            SnapMode::Streams => read_geotiff(&request.artifacts.streams)?,
            SnapMode::FlowAccumulation => read_geotiff(&request.artifacts.flow_accumulation)?,
        };

        let point = request.pour_point;
        let (x, y) = match (point.crs.as_ref(), pointer.crs()) {
            (Some(from), Some(to)) if !from.is_equivalent(to) => {
                Transformer::new(from, to)?.transform(point.geometry.x(), point.geometry.y())
            }
            _ => (point.geometry.x(), point.geometry.y()),
        };
        let (row, col) = snap_pour_point(x, y, &snap_grid, params.snap_mode, params.snap_distance)?;
        log::debug!("pour point snapped to cell ({}, {})", row, col);

        let mut outlet = Raster::filled(pointer.rows(), pointer.cols(), 0.0)
            .with_georef(*pointer.transform(), pointer.crs().copied())
            .with_nodata(Some(0.0));
        outlet.set(row, col, 1.0)?;
        let outlet_path = request.out_dir.join(POUR_POINT_RASTER);
        write_geotiff(&outlet, &outlet_path)?;

        let raster = request.out_dir.join(WATERSHED_RASTER);
        self.run(
            "Watershed",
            request.out_dir,
            &[
                arg("d8_pntr", &request.artifacts.d8_pointer),
                arg("pour_pts", &outlet_path),
                arg("output", &raster),
            ],
            params,
        )?;
        require_file("Watershed", &raster)?;
        Ok(WatershedArtifact { raster })
    }
}
