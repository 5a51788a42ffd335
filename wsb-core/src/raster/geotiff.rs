//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing comes from ModelPixelScale (33550) +
//! ModelTiepoint (33922), the CRS from the GeoKeyDirectory (34735) and the
//! no-data value from GDAL_NODATA (42113).

use crate::crs::Crs;
use crate::error::{BasinError, Result};
use crate::raster::{GeoTransform, Raster};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u32 = 32767;

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        BasinError::Raster(format!("cannot open {}: {}", path.display(), e))
    })?;
    decode_geotiff(BufReader::new(file))
        .map_err(|e| BasinError::Raster(format!("{}: {}", path.display(), e)))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<Raster> {
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(context: &str, e: impl std::fmt::Display) -> BasinError {
    BasinError::Raster(format!("{}: {}", context, e))
}

fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<Raster> {
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_err("TIFF decode error", e))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_err("cannot read dimensions", e))?;
    let (rows, cols) = (height as usize, width as usize);

    let transform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let image = decoder
        .read_image()
        .map_err(|e| tiff_err("cannot read image data", e))?;
    let data: Vec<f64> = match image {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf
            .into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(f64::NAN))
            .collect(),
        DecodingResult::I64(buf) => buf
            .into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(f64::NAN))
            .collect(),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(BasinError::Raster(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // multi-band files arrive interleaved; keep the first band
    let bands = if rows * cols == 0 { 1 } else { data.len() / (rows * cols) };
    let data = if bands > 1 {
        data.into_iter().step_by(bands).collect()
    } else {
        data
    };

    Ok(Raster::from_vec(data, rows, cols)?
        .with_georef(transform, crs)
        .with_nodata(nodata))
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(MODEL_PIXEL_SCALE)
        .map_err(|e| tiff_err("no pixel scale tag", e))?;
    let tiepoint = decoder
        .get_tag_f64_vec(MODEL_TIEPOINT)
        .map_err(|e| tiff_err("no tiepoint tag", e))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }
    Err(BasinError::Raster("cannot determine geotransform".into()))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder.get_tag_u32_vec(GEO_KEY_DIRECTORY).ok()?;
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks(4).take(count).collect();
    let lookup = |key: u16| {
        entries
            .iter()
            .find(|e| e.len() == 4 && e[0] == key as u32 && e[1] == 0)
            .map(|e| e[3])
            .filter(|code| *code != USER_DEFINED && *code != 0)
    };
    lookup(PROJECTED_CS_TYPE_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
        .map(Crs::from_epsg)
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer(raster: &Raster) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<W: Write + Seek>(raster: &Raster, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster.data().iter().map(|&v| v as f32).collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(MODEL_PIXEL_SCALE, &scale[..])
        .map_err(|e| tiff_err("cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(MODEL_TIEPOINT, &tiepoint[..])
        .map_err(|e| tiff_err("cannot write tiepoint tag", e))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(GEO_KEY_DIRECTORY, geokeys.as_slice())
        .map_err(|e| tiff_err("cannot write geokey tag", e))?;

    if let Some(nodata) = raster.nodata() {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(GDAL_NODATA, text.as_str())
            .map_err(|e| tiff_err("cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("cannot write image data", e))?;
    Ok(())
}

/// GeoKeyDirectory entries: version header followed by (key, location, count, value).
fn geokey_directory(crs: Option<&Crs>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    match crs {
        Some(crs) if crs.is_geographic() => {
            keys.push([GT_MODEL_TYPE_KEY, 0, 1, 2]);
            keys.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
            keys.push([GEOGRAPHIC_TYPE_KEY, 0, 1, crs.epsg() as u16]);
        }
        Some(crs) => {
            keys.push([GT_MODEL_TYPE_KEY, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
            keys.push([PROJECTED_CS_TYPE_KEY, 0, 1, crs.epsg() as u16]);
        }
        None => {
            keys.push([GT_MODEL_TYPE_KEY, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
        }
    }
    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.iter().flatten());
    directory
}
