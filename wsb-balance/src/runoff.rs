//! Water-balance aggregation pipeline

use crate::chart::render_balance_chart;
use crate::climate::{ClimateGridStack, ClimateLayer, ClimateProvider};
use crate::record::{write_csv, MonthlyBalanceRecord};
use crate::volume::zonal_volume;
use chrono::NaiveDate;
use geo::{BoundingRect, MultiPolygon};
use log::Level;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wsb_core::reproject::reproject;
use wsb_core::vector::{read_polygons, CrsGeometry};
use wsb_core::{BasinError, BasinMask, CellAreaGrid, Crs, GeoTransform, Raster, Result};
use wsb_utils::dates::{first_of_month, format_date, parse_layer_date};

pub const DEFAULT_PPT_VARIABLE: &str = "ppt";
pub const DEFAULT_AET_VARIABLE: &str = "aet";

/// A basin given directly or as a GeoJSON path.
#[derive(Debug, Clone)]
pub enum BasinInput {
    Geometry(CrsGeometry<MultiPolygon<f64>>),
    Path(PathBuf),
}

impl BasinInput {
    pub fn resolve(self) -> Result<CrsGeometry<MultiPolygon<f64>>> {
        match self {
            BasinInput::Geometry(basin) => Ok(basin),
            BasinInput::Path(path) => read_polygons(path),
        }
    }
}

impl From<CrsGeometry<MultiPolygon<f64>>> for BasinInput {
    fn from(basin: CrsGeometry<MultiPolygon<f64>>) -> Self {
        BasinInput::Geometry(basin)
    }
}

impl From<PathBuf> for BasinInput {
    fn from(path: PathBuf) -> Self {
        BasinInput::Path(path)
    }
}

impl From<&Path> for BasinInput {
    fn from(path: &Path) -> Self {
        BasinInput::Path(path.to_path_buf())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunoffRequest {
    /// First day of the range (inclusive)
    pub start: NaiveDate,
    /// Last day of the range (inclusive)
    pub end: NaiveDate,
    pub ppt_variable: String,
    pub aet_variable: String,
    pub csv_path: Option<PathBuf>,
    pub chart_path: Option<PathBuf>,
    pub quiet: bool,
}

impl RunoffRequest {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            ppt_variable: DEFAULT_PPT_VARIABLE.to_string(),
            aet_variable: DEFAULT_AET_VARIABLE.to_string(),
            csv_path: None,
            chart_path: None,
            quiet: false,
        }
    }

    pub fn with_csv<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.csv_path = Some(path.into());
        self
    }

    pub fn with_chart<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.chart_path = Some(path.into());
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn unavailable(&self, variable: &str) -> BasinError {
        BasinError::DataUnavailable {
            variable: variable.to_string(),
            start: format_date(&self.start),
            end: format_date(&self.end),
        }
    }
}

/// Period totals in m³
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunoffSummary {
    pub months: usize,
    pub total_ppt_m3: f64,
    pub total_aet_m3: f64,
    pub total_runoff_m3: f64,
}

impl RunoffSummary {
    pub fn from_records(records: &[MonthlyBalanceRecord]) -> Self {
        records.iter().fold(
            Self {
                months: records.len(),
                ..Self::default()
            },
            |acc, r| Self {
                total_ppt_m3: acc.total_ppt_m3 + r.ppt_vol_m3,
                total_aet_m3: acc.total_aet_m3 + r.aet_vol_m3,
                total_runoff_m3: acc.total_runoff_m3 + r.runoff_vol_m3,
                ..acc
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunoffReport {
    pub records: Vec<MonthlyBalanceRecord>,
    pub summary: RunoffSummary,
    pub csv_path: Option<PathBuf>,
    pub chart_path: Option<PathBuf>,
}

type GridKey = ((usize, usize), GeoTransform, Option<Crs>);

/// Basin mask and cell areas for one grid definition.
struct GridZone {
    key: GridKey,
    mask: BasinMask,
    areas: CellAreaGrid,
}

/// Masks and area grids per distinct grid, built on first use.
struct ZoneCache<'a> {
    basin: &'a CrsGeometry<MultiPolygon<f64>>,
    zones: Vec<GridZone>,
}

impl<'a> ZoneCache<'a> {
    fn new(basin: &'a CrsGeometry<MultiPolygon<f64>>) -> Self {
        Self {
            basin,
            zones: Vec::new(),
        }
    }

    fn zone_for(&mut self, raster: &Raster) -> Result<&GridZone> {
        let key: GridKey = (raster.shape(), *raster.transform(), raster.crs().copied());
        if let Some(i) = self.zones.iter().position(|z| z.key == key) {
            return Ok(&self.zones[i]);
        }
        let geometry = match (self.basin.crs.as_ref(), raster.crs()) {
            (Some(from), Some(to)) => reproject(&self.basin.geometry, from, to)?,
            _ => self.basin.geometry.clone(),
        };
        self.zones.push(GridZone {
            key,
            mask: BasinMask::new(raster, &geometry),
            areas: CellAreaGrid::for_raster(raster)?,
        });
        let zone = &self.zones[self.zones.len() - 1];
        if zone.mask.count() == 0 {
            log::warn!("no cell centre of the grid falls inside the basin");
        }
        log::debug!(
            "basin covers {} cells of a {}x{} grid",
            zone.mask.count(),
            zone.key.0 .0,
            zone.key.0 .1
        );
        Ok(zone)
    }
}

/// Monthly precipitation, evapotranspiration and runoff volumes over a basin.
///
/// Stacks are requested for the basin's bounding box; the grids define the
/// working CRS and the basin is reprojected into it.
pub fn calculate_runoff(
    basin: impl Into<BasinInput>,
    provider: &dyn ClimateProvider,
    request: &RunoffRequest,
) -> Result<RunoffReport> {
    let level = if request.quiet { Level::Debug } else { Level::Info };
    let basin = basin.into().resolve()?;
    if request.end < request.start {
        return Err(BasinError::Input(format!(
            "end date {} is before start date {}",
            request.end, request.start
        )));
    }
    let bbox = basin
        .geometry
        .bounding_rect()
        .ok_or_else(|| BasinError::Input("basin has no extent".into()))?;
    let extent = CrsGeometry::new(bbox, basin.crs);

    let ppt = fetch_stack(provider, &extent, &request.ppt_variable, request, level)?;
    let aet = fetch_stack(provider, &extent, &request.aet_variable, request, level)?;
    if ppt.len() != aet.len() {
        return Err(BasinError::MisalignedStacks {
            ppt: ppt.len(),
            aet: aet.len(),
        });
    }

    let aet_by_month = layers_by_month(&aet)?;
    let mut zones = ZoneCache::new(&basin);
    let mut records = Vec::with_capacity(ppt.len());
    for p in &ppt.layers {
        let date = parse_layer_date(&p.label)?;
        let a = aet_by_month
            .get(&first_of_month(&date))
            .ok_or_else(|| BasinError::UnpairedMonth {
                variable: request.aet_variable.clone(),
                label: p.label.clone(),
            })?;
        let zone = zones.zone_for(&p.raster)?;
        let ppt_vol = zonal_volume(&p.raster, &zone.mask, &zone.areas)
            .ok_or_else(|| request.unavailable(&request.ppt_variable))?;
        let zone = zones.zone_for(&a.raster)?;
        let aet_vol = zonal_volume(&a.raster, &zone.mask, &zone.areas)
            .ok_or_else(|| request.unavailable(&request.aet_variable))?;
        records.push(MonthlyBalanceRecord::new(date, ppt_vol, aet_vol));
    }

    let summary = RunoffSummary::from_records(&records);
    log::log!(
        level,
        "{} months: precipitation {:.0} m³, evapotranspiration {:.0} m³, runoff {:.0} m³",
        summary.months,
        summary.total_ppt_m3,
        summary.total_aet_m3,
        summary.total_runoff_m3
    );

    if let Some(path) = &request.csv_path {
        write_csv(path, &records)?;
        log::log!(level, "Wrote {}", path.display());
    }
    if let Some(path) = &request.chart_path {
        render_balance_chart(path, &records, "Monthly basin water balance")?;
        log::log!(level, "Wrote {}", path.display());
    }

    Ok(RunoffReport {
        records,
        summary,
        csv_path: request.csv_path.clone(),
        chart_path: request.chart_path.clone(),
    })
}

/// Layers keyed by the first day of their month; the first layer of a month wins.
fn layers_by_month(stack: &ClimateGridStack) -> Result<BTreeMap<NaiveDate, &ClimateLayer>> {
    let mut by_month = BTreeMap::new();
    for layer in &stack.layers {
        let month = first_of_month(&parse_layer_date(&layer.label)?);
        if by_month.contains_key(&month) {
            log::warn!("ignoring {}: month already covered", layer.label);
            continue;
        }
        by_month.insert(month, layer);
    }
    Ok(by_month)
}

fn fetch_stack(
    provider: &dyn ClimateProvider,
    extent: &CrsGeometry<geo::Rect<f64>>,
    variable: &str,
    request: &RunoffRequest,
    level: Level,
) -> Result<ClimateGridStack> {
    log::log!(
        level,
        "Requesting '{}' grids {} to {}",
        variable,
        request.start,
        request.end
    );
    let stack = provider.monthly_stack(extent, variable, request.start, request.end)?;
    if stack.is_empty() {
        return Err(request.unavailable(variable));
    }
    Ok(stack)
}
