//! Raster, vector and coordinate-system building blocks shared by the
//! basin delineation and water-balance pipelines.

pub mod crs;
pub mod error;
pub mod http;
pub mod raster;
pub mod reproject;
pub mod vector;

pub use crs::Crs;
pub use error::{BasinError, Result};
pub use raster::{BasinMask, CellAreaGrid, GeoTransform, Raster};
pub use vector::CrsGeometry;
