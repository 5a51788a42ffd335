//! Command implementations for the WSB CLI.
//!
//! `delineate` derives a basin boundary from an area of interest and
//! `runoff` turns a basin boundary into a monthly water balance.

use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;
use wsb_delineate::SnapMode;
use wsb_utils::dates::parse_date;

pub mod delineate;
pub mod runoff;

/// Snap target for the pour point
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapTarget {
    /// Nearest stream cell
    Streams,
    /// Highest flow accumulation cell
    Accumulation,
}

impl From<SnapTarget> for SnapMode {
    fn from(target: SnapTarget) -> Self {
        match target {
            SnapTarget::Streams => SnapMode::Streams,
            SnapTarget::Accumulation => SnapMode::FlowAccumulation,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Delineate the watershed draining an area of interest
    Delineate {
        /// GeoJSON polygon of the area of interest
        #[arg(short = 'a', long)]
        aoi: PathBuf,

        /// Directory for the DEM, flow rasters and basin outputs
        #[arg(short = 'o', long, default_value = "basin")]
        out_dir: PathBuf,

        /// DEM resolution tier (12 and up: 30 m, 9-11: 90 m, below: 15 arc-second)
        #[arg(short = 'z', long, default_value_t = wsb_delineate::delineate::DEFAULT_DEM_TIER)]
        dem_tier: u8,

        /// GeoJSON pour point; prompts on the terminal when omitted
        #[arg(short = 'p', long)]
        pour_point: Option<PathBuf>,

        /// Flow accumulation (cells) at which a cell becomes a stream
        #[arg(long, default_value_t = 1000.0)]
        stream_threshold: f64,

        /// Pour point snap radius in metres
        #[arg(long, default_value_t = 100.0)]
        snap_distance: f64,

        #[arg(long, value_enum, default_value_t = SnapTarget::Streams)]
        snap_to: SnapTarget,

        /// OpenTopography API key
        #[arg(long, env = "OPENTOPOGRAPHY_API_KEY", hide_env_values = true)]
        api_key: String,

        /// WhiteboxTools executable
        #[arg(long, env = "WHITEBOX_TOOLS", default_value = "whitebox_tools")]
        whitebox: PathBuf,

        /// Only log progress at debug level
        #[arg(short = 'q', long)]
        quiet: bool,
    },

    /// Monthly precipitation, evapotranspiration and runoff volumes for a basin
    Runoff {
        /// GeoJSON basin boundary, e.g. the basin.geojson written by `delineate`
        #[arg(short = 'b', long)]
        basin: PathBuf,

        /// First day of the period (YYYY-MM-DD)
        #[arg(short = 's', long, value_parser = parse_date)]
        start: NaiveDate,

        /// Last day of the period (YYYY-MM-DD)
        #[arg(short = 'e', long, value_parser = parse_date)]
        end: NaiveDate,

        /// Directory of monthly GeoTIFFs named `<variable>_YYYY-MM-DD.tif`
        #[arg(long, conflicts_with = "climate_url", required_unless_present = "climate_url")]
        climate_dir: Option<PathBuf>,

        /// URL template with `{variable}`, `{year}` and `{month}` placeholders
        #[arg(long)]
        climate_url: Option<String>,

        #[arg(long, default_value = wsb_balance::runoff::DEFAULT_PPT_VARIABLE)]
        ppt_variable: String,

        #[arg(long, default_value = wsb_balance::runoff::DEFAULT_AET_VARIABLE)]
        aet_variable: String,

        /// Output path for the monthly balance CSV
        #[arg(short = 'c', long)]
        csv: Option<PathBuf>,

        /// Output path for the SVG chart
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Only log progress at debug level
        #[arg(short = 'q', long)]
        quiet: bool,
    },
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Delineate {
            aoi,
            out_dir,
            dem_tier,
            pour_point,
            stream_threshold,
            snap_distance,
            snap_to,
            api_key,
            whitebox,
            quiet,
        } => delineate::run_delineate(delineate::DelineateArgs {
            aoi,
            out_dir,
            dem_tier,
            pour_point,
            stream_threshold,
            snap_distance,
            snap_mode: snap_to.into(),
            api_key,
            whitebox,
            quiet,
        }),
        Command::Runoff {
            basin,
            start,
            end,
            climate_dir,
            climate_url,
            ppt_variable,
            aet_variable,
            csv,
            chart,
            quiet,
        } => {
            let source = match (climate_dir, climate_url) {
                (Some(dir), _) => runoff::ClimateSource::Directory(dir),
                (None, Some(template)) => runoff::ClimateSource::UrlTemplate(template),
                (None, None) => anyhow::bail!("one of --climate-dir or --climate-url is required"),
            };
            runoff::run_runoff(runoff::RunoffArgs {
                basin,
                start,
                end,
                source,
                ppt_variable,
                aet_variable,
                csv,
                chart,
                quiet,
            })
        }
    }
}
