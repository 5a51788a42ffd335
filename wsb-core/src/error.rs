/// Error types for the watershed balance crates
use std::path::PathBuf;
use thiserror::Error;
use wsb_utils::error::DateError;

/// Main error type for delineation and water-balance operations
#[derive(Error, Debug)]
pub enum BasinError {
    /// Geometry input could not be read or holds no usable geometry
    #[error("Invalid input: {0}")]
    Input(String),

    /// An expected terrain toolchain output is missing
    #[error("External tool '{tool}' did not produce {}", path.display())]
    ExternalTool { tool: String, path: PathBuf },

    /// The external tool ran but reported failure
    #[error("External tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// The climate provider returned no monthly grids
    #[error("No '{variable}' grids available between {start} and {end}")]
    DataUnavailable {
        variable: String,
        start: String,
        end: String,
    },

    /// A layer's temporal label could not be turned into a date
    #[error("Failed to parse date: {0}")]
    DateParse(#[from] DateError),

    /// The interactive session closed without a point
    #[error("No pour point was placed")]
    NoPourPoint,

    /// Precipitation and evapotranspiration stacks disagree in length
    #[error("Stacks are misaligned: {ppt} precipitation months vs {aet} evapotranspiration months")]
    MisalignedStacks { ppt: usize, aet: usize },

    /// A precipitation month has no evapotranspiration grid for the same month
    #[error("No '{variable}' grid for the month of '{label}'")]
    UnpairedMonth { variable: String, label: String },

    /// Reprojection between these coordinate systems is not available
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Raster decoding, encoding or shape failure
    #[error("Raster error: {0}")]
    Raster(String),

    /// Chart rendering failed
    #[error("Failed to render chart: {0}")]
    Chart(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to write CSV data
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results using BasinError
pub type Result<T> = std::result::Result<T, BasinError>;
