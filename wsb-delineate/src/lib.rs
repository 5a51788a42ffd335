//! Watershed delineation: area of interest in, dissolved basin boundary out.
//!
//! DEM acquisition and terrain analysis sit behind the [`DemProvider`] and
//! [`TerrainToolchain`] traits; [`OpenTopographyProvider`] and
//! [`WhiteboxToolchain`] are the bundled adapters.

pub mod aoi;
pub mod delineate;
pub mod dem;
pub mod pour_point;
pub mod terrain;

pub use aoi::{AoiInput, AreaOfInterest};
pub use delineate::{BasinBoundary, DelineationConfig, Delineator};
pub use dem::{DemCache, DemProvider, OpenTopographyProvider};
pub use pour_point::{PointPicker, PourPoint, PourPointSource, TerminalPicker};
pub use terrain::{
    FlowArtifacts, HydroParams, PrepareRequest, SnapMode, StreamNetwork, TerrainToolchain,
    WatershedArtifact, WatershedRequest, WhiteboxToolchain,
};
