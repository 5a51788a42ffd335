//! Raster grids and the operations the pipelines run on them

mod area;
mod geotiff;
mod geotransform;
mod grid;
mod mask;
mod polygonize;

pub use area::CellAreaGrid;
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use mask::BasinMask;
pub use polygonize::polygonize;
