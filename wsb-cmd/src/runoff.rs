//! `runoff` command

use chrono::NaiveDate;
use log::info;
use std::path::PathBuf;
use wsb_balance::{
    calculate_runoff, ClimateProvider, DirectoryProvider, RunoffRequest, UrlTemplateProvider,
};

/// Where monthly climate grids are read from
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateSource {
    Directory(PathBuf),
    UrlTemplate(String),
}

impl ClimateSource {
    pub fn provider(&self) -> anyhow::Result<Box<dyn ClimateProvider>> {
        let provider: Box<dyn ClimateProvider> = match self {
            ClimateSource::Directory(dir) => Box::new(DirectoryProvider::new(dir)),
            ClimateSource::UrlTemplate(template) => {
                Box::new(UrlTemplateProvider::new(template.as_str())?)
            }
        };
        Ok(provider)
    }
}

#[derive(Debug, Clone)]
pub struct RunoffArgs {
    pub basin: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: ClimateSource,
    pub ppt_variable: String,
    pub aet_variable: String,
    pub csv: Option<PathBuf>,
    pub chart: Option<PathBuf>,
    pub quiet: bool,
}

impl RunoffArgs {
    pub fn request(&self) -> RunoffRequest {
        let mut request = RunoffRequest::new(self.start, self.end).quiet(self.quiet);
        request.ppt_variable = self.ppt_variable.clone();
        request.aet_variable = self.aet_variable.clone();
        request.csv_path = self.csv.clone();
        request.chart_path = self.chart.clone();
        request
    }
}

/// Compute the monthly balance and print it as a table.
pub fn run_runoff(args: RunoffArgs) -> anyhow::Result<()> {
    let provider = args.source.provider()?;
    let report = calculate_runoff(args.basin.as_path(), provider.as_ref(), &args.request())?;

    println!("date,ppt_vol_m3,aet_vol_m3,runoff_vol_m3");
    for r in &report.records {
        println!(
            "{},{:.1},{:.1},{:.1}",
            r.date, r.ppt_vol_m3, r.aet_vol_m3, r.runoff_vol_m3
        );
    }
    info!(
        "Total runoff over {} months: {:.0} m³",
        report.summary.months, report.summary.total_runoff_m3
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use std::fs;
    use wsb_balance::climate::layer_path;
    use wsb_core::raster::write_geotiff;
    use wsb_core::vector::{write_polygons, CrsGeometry};
    use wsb_core::{Crs, GeoTransform, Raster};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_request_from_args() {
        let args = RunoffArgs {
            basin: PathBuf::from("basin.geojson"),
            start: date(2021, 10, 1),
            end: date(2022, 9, 30),
            source: ClimateSource::Directory(PathBuf::from("grids")),
            ppt_variable: "pr".into(),
            aet_variable: "et".into(),
            csv: Some(PathBuf::from("wy2022.csv")),
            chart: None,
            quiet: false,
        };
        let request = args.request();
        assert_eq!(request.start, date(2021, 10, 1));
        assert_eq!(request.ppt_variable, "pr");
        assert_eq!(request.aet_variable, "et");
        assert_eq!(request.csv_path, Some(PathBuf::from("wy2022.csv")));
        assert!(request.chart_path.is_none());
        assert!(!request.quiet);
    }

    #[test]
    fn test_runoff_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let grids = dir.path().join("grids");
        fs::create_dir_all(&grids).unwrap();
        let utm = Crs::utm(10, true);
        for (variable, depth) in [("ppt", 20.0), ("aet", 5.0)] {
            for month in 1..=2 {
                let raster = Raster::filled(4, 4, depth).with_georef(
                    GeoTransform::new(500_000.0, 4_104_000.0, 1000.0, -1000.0),
                    Some(utm),
                );
                write_geotiff(&raster, layer_path(&grids, variable, date(2020, month, 1)))
                    .unwrap();
            }
        }
        let basin = dir.path().join("basin.geojson");
        write_polygons(
            &basin,
            &CrsGeometry::new(
                polygon![
                    (x: 501_000.0, y: 4_101_000.0),
                    (x: 503_000.0, y: 4_101_000.0),
                    (x: 503_000.0, y: 4_103_000.0),
                    (x: 501_000.0, y: 4_103_000.0),
                ]
                .into(),
                Some(utm),
            ),
            Default::default(),
        )
        .unwrap();

        let csv = dir.path().join("balance.csv");
        run_runoff(RunoffArgs {
            basin,
            start: date(2020, 1, 1),
            end: date(2020, 2, 29),
            source: ClimateSource::Directory(grids),
            ppt_variable: "ppt".into(),
            aet_variable: "aet".into(),
            csv: Some(csv.clone()),
            chart: None,
            quiet: true,
        })
        .unwrap();

        // 4 km² of basin: 20 mm is 80 000 m³, 5 mm is 20 000 m³
        let text = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2020-01-01,80000.0,20000.0,60000.0,2020,1");
        assert_eq!(lines[2], "2020-02-01,80000.0,20000.0,60000.0,2020,2");
    }
}
