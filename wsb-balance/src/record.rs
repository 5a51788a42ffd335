//! Monthly balance records and their CSV form

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::path::Path;
use wsb_core::Result;

/// One calendar month of basin water balance, volumes in m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyBalanceRecord {
    pub date: NaiveDate,
    pub ppt_vol_m3: f64,
    pub aet_vol_m3: f64,
    /// `ppt_vol_m3 - aet_vol_m3`; negative when evapotranspiration wins
    pub runoff_vol_m3: f64,
    pub year: i32,
    pub month: u32,
}

impl MonthlyBalanceRecord {
    pub fn new(date: NaiveDate, ppt_vol_m3: f64, aet_vol_m3: f64) -> Self {
        Self {
            date,
            ppt_vol_m3,
            aet_vol_m3,
            runoff_vol_m3: ppt_vol_m3 - aet_vol_m3,
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Write records with a header row, replacing any existing file
pub fn write_csv<P: AsRef<Path>>(path: P, records: &[MonthlyBalanceRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
