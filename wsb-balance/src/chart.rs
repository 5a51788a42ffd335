//! SVG line chart of the monthly balance series

use crate::record::MonthlyBalanceRecord;
use chrono::NaiveDate;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use wsb_core::{BasinError, Result};

const MILLION: f64 = 1_000_000.0;

fn chart_err(e: impl std::fmt::Display) -> BasinError {
    BasinError::Chart(e.to_string())
}

/// Draw precipitation, evapotranspiration and runoff (million m³) to an SVG file.
pub fn render_balance_chart<P: AsRef<Path>>(
    path: P,
    records: &[MonthlyBalanceRecord],
    title: &str,
) -> Result<()> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Err(BasinError::Chart("no records to draw".into()));
    };
    let dates = Range {
        start: first.date,
        end: last.date.max(first.date.succ_opt().unwrap_or(first.date)),
    };
    let ranged_date: RangedDate<NaiveDate> = dates.into();

    let values = records
        .iter()
        .flat_map(|r| [r.ppt_vol_m3, r.aet_vol_m3, r.runoff_vol_m3])
        .map(|v| v / MILLION);
    let (lo, hi) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.05).max(0.01);

    let backend = SVGBackend::new(path.as_ref(), (800u32, 600u32));
    let area = backend.into_drawing_area();
    area.fill(&WHITE).map_err(chart_err)?;
    let mut chart = ChartBuilder::on(&area)
        .caption(title, ("sans-serif", 20))
        .margin(20i32)
        .x_label_area_size(30u32)
        .y_label_area_size(60u32)
        .build_cartesian_2d(ranged_date, (lo - pad)..(hi + pad))
        .map_err(chart_err)?;
    chart
        .configure_mesh()
        .x_labels(12_usize)
        .y_desc("million m³")
        .draw()
        .map_err(chart_err)?;

    let series: [(&str, RGBColor, fn(&MonthlyBalanceRecord) -> f64); 3] = [
        ("Precipitation", BLUE, |r| r.ppt_vol_m3),
        ("Evapotranspiration", GREEN, |r| r.aet_vol_m3),
        ("Runoff", RED, |r| r.runoff_vol_m3),
    ];
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                records.iter().map(|r| (r.date, value(r) / MILLION)),
                color,
            ))
            .map_err(chart_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;
    area.present().map_err(chart_err)?;
    Ok(())
}
