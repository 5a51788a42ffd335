//! Monthly climate grids and the providers that supply them

use chrono::{Datelike, NaiveDate};
use geo::Rect;
use std::fs;
use std::path::{Path, PathBuf};
use wsb_core::http::{redact, BlockingFetcher};
use wsb_core::raster::{read_geotiff, read_geotiff_from_buffer};
use wsb_core::reproject::reproject_rect;
use wsb_core::vector::CrsGeometry;
use wsb_core::{Crs, Raster, Result};
use wsb_utils::dates::{first_of_month, months_in_range, parse_layer_date, MonthRange};

/// One month of one climate variable, values in millimetres.
#[derive(Debug, Clone)]
pub struct ClimateLayer {
    /// Temporal label, e.g. `ppt_2020-01-01`
    pub label: String,
    pub raster: Raster,
}

/// Chronologically ordered monthly grids for one variable.
#[derive(Debug, Clone)]
pub struct ClimateGridStack {
    pub variable: String,
    pub layers: Vec<ClimateLayer>,
}

impl ClimateGridStack {
    pub fn new<S: Into<String>>(variable: S, layers: Vec<ClimateLayer>) -> Self {
        Self {
            variable: variable.into(),
            layers,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// CRS of the grids; the first layer defines it for the whole stack
    pub fn crs(&self) -> Option<Crs> {
        self.layers.first().and_then(|l| l.raster.crs().copied())
    }
}

/// Source of monthly climate grids.
pub trait ClimateProvider {
    /// Grids of `variable` for every available month in `[start, end]`,
    /// clipped to `extent`. Months with no coverage are left out, so an
    /// extent outside the provider's domain yields an empty stack.
    fn monthly_stack(
        &self,
        extent: &CrsGeometry<Rect<f64>>,
        variable: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ClimateGridStack>;
}

/// Crop `raster` to the cells touching `extent`; `None` when they miss.
pub fn clip_to_extent(raster: &Raster, extent: &CrsGeometry<Rect<f64>>) -> Result<Option<Raster>> {
    let rect = match (extent.crs.as_ref(), raster.crs()) {
        (Some(from), Some(to)) => reproject_rect(&extent.geometry, from, to)?,
        _ => extent.geometry,
    };
    match raster.window_for(&rect) {
        Some((row0, col0, rows, cols)) => raster.crop(row0, col0, rows, cols).map(Some),
        None => Ok(None),
    }
}

/// GeoTIFF layers named `<variable>_<label>.tif` in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Dated layer files for `variable`, sorted by date
    fn layer_files(&self, variable: &str) -> Result<Vec<(NaiveDate, String, PathBuf)>> {
        let prefix = format!("{}_", variable);
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_tif = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_tif || !stem.starts_with(&prefix) {
                continue;
            }
            match parse_layer_date(stem) {
                Ok(date) => files.push((date, stem.to_string(), path.clone())),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(files)
    }
}

impl ClimateProvider for DirectoryProvider {
    fn monthly_stack(
        &self,
        extent: &CrsGeometry<Rect<f64>>,
        variable: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ClimateGridStack> {
        let (first, last) = (first_of_month(&start), first_of_month(&end));
        let mut layers = Vec::new();
        for (date, label, path) in self.layer_files(variable)? {
            // whole months: any layer dated within a touched month counts
            let month = first_of_month(&date);
            if month < first || month > last {
                continue;
            }
            let raster = read_geotiff(&path)?;
            match clip_to_extent(&raster, extent)? {
                Some(raster) => layers.push(ClimateLayer { label, raster }),
                None => log::debug!("{} does not cover the basin", path.display()),
            }
        }
        Ok(ClimateGridStack::new(variable, layers))
    }
}

/// One GeoTIFF per month over HTTP.
///
/// The template may use `{variable}`, `{year}` and `{month}` (two digits).
/// A 404 means the month is not available.
pub struct UrlTemplateProvider {
    template: String,
    fetcher: BlockingFetcher,
}

impl UrlTemplateProvider {
    pub fn new<S: Into<String>>(template: S) -> Result<Self> {
        Ok(Self {
            template: template.into(),
            fetcher: BlockingFetcher::new()?,
        })
    }

    pub fn url_for(&self, variable: &str, month: NaiveDate) -> String {
        self.template
            .replace("{variable}", variable)
            .replace("{year}", &month.year().to_string())
            .replace("{month}", &format!("{:02}", month.month()))
    }
}

impl ClimateProvider for UrlTemplateProvider {
    fn monthly_stack(
        &self,
        extent: &CrsGeometry<Rect<f64>>,
        variable: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ClimateGridStack> {
        let mut layers = Vec::with_capacity(months_in_range(&start, &end));
        for month in MonthRange::new(start, end) {
            let url = self.url_for(variable, month);
            let Some(bytes) = self.fetcher.get_bytes(&url)? else {
                log::debug!("{} not found", redact(&url));
                continue;
            };
            let raster = read_geotiff_from_buffer(&bytes)?;
            if let Some(raster) = clip_to_extent(&raster, extent)? {
                layers.push(ClimateLayer {
                    label: format!("{}_{}", variable, month.format("%Y-%m-%d")),
                    raster,
                });
            }
        }
        Ok(ClimateGridStack::new(variable, layers))
    }
}

/// Label-to-path helper for writing provider directories
pub fn layer_path(dir: &Path, variable: &str, month: NaiveDate) -> PathBuf {
    dir.join(format!("{}_{}.tif", variable, month.format("%Y-%m-%d")))
}
