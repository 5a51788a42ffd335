//! Monthly water balance of a basin from gridded climate data.
//!
//! Precipitation and actual evapotranspiration depths (mm) are masked to the
//! basin, integrated over cell areas into volumes and differenced into runoff.

pub mod chart;
pub mod climate;
pub mod record;
pub mod runoff;
pub mod volume;

pub use chart::render_balance_chart;
pub use climate::{
    ClimateGridStack, ClimateLayer, ClimateProvider, DirectoryProvider, UrlTemplateProvider,
};
pub use record::{write_csv, MonthlyBalanceRecord};
pub use runoff::{calculate_runoff, BasinInput, RunoffReport, RunoffRequest, RunoffSummary};
pub use volume::zonal_volume;
