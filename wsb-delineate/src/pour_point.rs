//! Pour point (watershed outlet) resolution

use crate::terrain::StreamNetwork;
use geo::{Contains, Point};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use wsb_core::reproject::reproject;
use wsb_core::vector::{read_point, CrsGeometry};
use wsb_core::{BasinError, Result};

/// Watershed outlet, tagged with its CRS when known.
pub type PourPoint = CrsGeometry<Point<f64>>;

/// Interactive outlet selection over a stream network.
pub trait PointPicker {
    /// Block until a point is placed; `Ok(None)` when the user cancels.
    /// Returned coordinates are in the network's CRS.
    fn pick(&mut self, network: &StreamNetwork) -> Result<Option<Point<f64>>>;
}

/// Where the pour point of a delineation run comes from.
pub enum PourPointSource {
    /// Used as-is
    Explicit(PourPoint),
    /// GeoJSON point file, brought into the stream network CRS
    FromFile(PathBuf),
    Interactive(Box<dyn PointPicker>),
}

impl fmt::Debug for PourPointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(p) => f.debug_tuple("Explicit").field(p).finish(),
            Self::FromFile(path) => f.debug_tuple("FromFile").field(path).finish(),
            Self::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

impl PourPointSource {
    pub fn resolve(self, network: &StreamNetwork) -> Result<PourPoint> {
        let point = match self {
            PourPointSource::Explicit(point) => point,
            PourPointSource::FromFile(path) => {
                let read = read_point(&path)?;
                match (read.crs, network.crs) {
                    (Some(from), Some(to)) if !from.is_equivalent(&to) => {
                        log::debug!("reprojecting pour point from {} to {}", from, to);
                        PourPoint::new(reproject(&read.geometry, &from, &to)?, Some(to))
                    }
                    (None, crs) => PourPoint::new(read.geometry, crs),
                    (crs, _) => PourPoint::new(read.geometry, crs),
                }
            }
            PourPointSource::Interactive(mut picker) => {
                let point = picker.pick(network)?.ok_or(BasinError::NoPourPoint)?;
                PourPoint::new(point, network.crs)
            }
        };
        let comparable = point.crs.is_none() || point.crs == network.crs;
        if comparable && !network.extent.contains(&point.geometry) {
            log::warn!(
                "pour point ({}, {}) lies outside the stream network extent",
                point.geometry.x(),
                point.geometry.y()
            );
        }
        Ok(point)
    }
}

/// Prompts for `x,y` coordinates on a terminal.
///
/// An empty line or end of input cancels.
pub struct TerminalPicker<R, W> {
    input: R,
    output: W,
}

impl TerminalPicker<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPicker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn parse(line: &str) -> Option<Point<f64>> {
        let mut parts = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty());
        let x = parts.next()?.parse::<f64>().ok()?;
        let y = parts.next()?.parse::<f64>().ok()?;
        match parts.next() {
            None if x.is_finite() && y.is_finite() => Some(Point::new(x, y)),
            _ => None,
        }
    }
}

impl<R: BufRead, W: Write> PointPicker for TerminalPicker<R, W> {
    fn pick(&mut self, network: &StreamNetwork) -> Result<Option<Point<f64>>> {
        let crs = network
            .crs
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown CRS".to_string());
        writeln!(
            self.output,
            "Streams: {}\nExtent ({}): x {} .. {}, y {} .. {}",
            network.vector_path.display(),
            crs,
            network.extent.min().x,
            network.extent.max().x,
            network.extent.min().y,
            network.extent.max().y
        )?;
        loop {
            write!(self.output, "Pour point x,y (blank to cancel): ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 || line.trim().is_empty() {
                return Ok(None);
            }
            match Self::parse(line.trim()) {
                Some(point) => return Ok(Some(point)),
                None => writeln!(self.output, "Could not read '{}' as x,y", line.trim())?,
            }
        }
    }
}
