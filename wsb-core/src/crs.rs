//! Coordinate Reference System handling

use crate::error::BasinError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EPSG codes treated as geographic (degrees on a WGS84-like ellipsoid).
const GEOGRAPHIC_CODES: [u32; 4] = [4326, 4269, 4258, 4283];

/// Coordinate Reference System, identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// UTM zone on WGS84 (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC_CODES.contains(&self.epsg)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        self.epsg == other.epsg
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Accepts `EPSG:4326`, `epsg:4326`, `urn:ogc:def:crs:EPSG::4326`, bare `4326`
/// and the OGC `CRS84` name.
impl FromStr for Crs {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.to_ascii_uppercase().ends_with("CRS84") {
            return Ok(Self::wgs84());
        }
        let code = trimmed
            .rsplit(':')
            .next()
            .filter(|_| trimmed.to_ascii_uppercase().contains("EPSG") || !trimmed.contains(':'))
            .and_then(|tail| tail.parse::<u32>().ok())
            .ok_or_else(|| BasinError::UnsupportedCrs(trimmed.to_string()))?;
        Ok(Self::from_epsg(code))
    }
}
