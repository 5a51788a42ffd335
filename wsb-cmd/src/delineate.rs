//! `delineate` command

use log::info;
use std::path::PathBuf;
use wsb_delineate::{
    DelineationConfig, Delineator, OpenTopographyProvider, PourPointSource, SnapMode,
    TerminalPicker, WhiteboxToolchain,
};

#[derive(Debug, Clone)]
pub struct DelineateArgs {
    pub aoi: PathBuf,
    pub out_dir: PathBuf,
    pub dem_tier: u8,
    pub pour_point: Option<PathBuf>,
    pub stream_threshold: f64,
    pub snap_distance: f64,
    pub snap_mode: SnapMode,
    pub api_key: String,
    pub whitebox: PathBuf,
    pub quiet: bool,
}

impl DelineateArgs {
    pub fn config(&self) -> DelineationConfig {
        let mut config = DelineationConfig::new(&self.out_dir).quiet(self.quiet);
        config.dem_tier = self.dem_tier;
        config.params.stream_threshold = self.stream_threshold;
        config.params.snap_distance = self.snap_distance;
        config.params.snap_mode = self.snap_mode;
        config
    }

    pub fn pour_point_source(&self) -> PourPointSource {
        match &self.pour_point {
            Some(path) => PourPointSource::FromFile(path.clone()),
            None => PourPointSource::Interactive(Box::new(TerminalPicker::stdio())),
        }
    }
}

/// Fetch a DEM, run the terrain tools and write `basin.geojson`.
pub fn run_delineate(args: DelineateArgs) -> anyhow::Result<()> {
    if args.api_key.trim().is_empty() {
        anyhow::bail!("an OpenTopography API key is required (--api-key or OPENTOPOGRAPHY_API_KEY)");
    }
    let dem = OpenTopographyProvider::new(args.api_key.clone())?;
    let toolchain = WhiteboxToolchain::new(&args.whitebox);
    let config = args.config();

    let basin = Delineator::new(&dem, &toolchain).delineate_basin(
        args.aoi.as_path(),
        &config,
        args.pour_point_source(),
    )?;

    info!(
        "Basin written to {} ({} polygon(s))",
        basin.path.display(),
        basin.geometry.0.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DelineateArgs {
        DelineateArgs {
            aoi: PathBuf::from("aoi.geojson"),
            out_dir: PathBuf::from("out"),
            dem_tier: 10,
            pour_point: None,
            stream_threshold: 500.0,
            snap_distance: 250.0,
            snap_mode: SnapMode::FlowAccumulation,
            api_key: "secret".into(),
            whitebox: PathBuf::from("whitebox_tools"),
            quiet: true,
        }
    }

    #[test]
    fn test_config_from_args() {
        let config = args().config();
        assert_eq!(config.out_dir, PathBuf::from("out"));
        assert_eq!(config.dem_tier, 10);
        assert!(config.quiet);
        assert!(!config.params.verbose);
        assert_eq!(config.params.stream_threshold, 500.0);
        assert_eq!(config.params.snap_distance, 250.0);
        assert_eq!(config.params.snap_mode, SnapMode::FlowAccumulation);
        assert_eq!(config.params.breach_distance, 10);
    }

    #[test]
    fn test_pour_point_source() {
        let mut a = args();
        assert!(matches!(a.pour_point_source(), PourPointSource::Interactive(_)));
        a.pour_point = Some(PathBuf::from("outlet.geojson"));
        assert!(matches!(
            a.pour_point_source(),
            PourPointSource::FromFile(p) if p == PathBuf::from("outlet.geojson")
        ));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let mut a = args();
        a.api_key = "  ".into();
        let err = run_delineate(a).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
