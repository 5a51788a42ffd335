//! Digital elevation model acquisition and caching

use crate::aoi::AreaOfInterest;
use log::Level;
use std::fs;
use std::path::{Path, PathBuf};
use wsb_core::http::{redact, BlockingFetcher};
use wsb_core::raster::read_geotiff_from_buffer;
use wsb_core::reproject::reproject_rect;
use wsb_core::{BasinError, Crs, Result};

const OPENTOPOGRAPHY_URL: &str = "https://portal.opentopography.org/API/globaldem";

/// Source of elevation GeoTIFFs.
pub trait DemProvider {
    /// Write a DEM covering `aoi` at resolution tier `tier` to `dest`.
    fn fetch(&self, aoi: &AreaOfInterest, tier: u8, dest: &Path) -> Result<()>;
}

/// Per output directory DEM cache, one file per resolution tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemCache {
    dir: PathBuf,
    tier: u8,
}

impl DemCache {
    pub fn new<P: Into<PathBuf>>(dir: P, tier: u8) -> Self {
        Self {
            dir: dir.into(),
            tier,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("dem_z{}.tif", self.tier))
    }

    pub fn is_cached(&self) -> bool {
        self.path().is_file()
    }

    /// Return the cached DEM, fetching it first when it is not on disk.
    pub fn get_or_fetch(
        &self,
        provider: &dyn DemProvider,
        aoi: &AreaOfInterest,
        level: Level,
    ) -> Result<PathBuf> {
        let path = self.path();
        if self.is_cached() {
            log::log!(level, "Reusing cached DEM {}", path.display());
            return Ok(path);
        }
        fs::create_dir_all(&self.dir)?;
        log::log!(level, "Fetching DEM at tier {} into {}", self.tier, path.display());
        provider.fetch(aoi, self.tier, &path)?;
        if !path.is_file() {
            return Err(BasinError::ExternalTool {
                tool: "DEM provider".into(),
                path,
            });
        }
        Ok(path)
    }
}

/// OpenTopography global DEM REST API.
pub struct OpenTopographyProvider {
    api_key: String,
    base_url: String,
    fetcher: BlockingFetcher,
}

impl OpenTopographyProvider {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: OPENTOPOGRAPHY_URL.to_string(),
            fetcher: BlockingFetcher::new()?,
        })
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Dataset for a tile zoom tier: 30 m from zoom 12 up, 90 m for 9-11,
    /// SRTM15+ below that.
    pub fn dataset_for_tier(tier: u8) -> &'static str {
        match tier {
            12..=u8::MAX => "COP30",
            9..=11 => "COP90",
            _ => "SRTM15Plus",
        }
    }

    pub fn request_url(&self, aoi: &AreaOfInterest, tier: u8) -> Result<String> {
        let bbox = reproject_rect(&aoi.bbox()?, aoi.crs(), &Crs::wgs84())?;
        Ok(format!(
            "{}?demtype={}&south={}&north={}&west={}&east={}&outputFormat=GTiff&API_Key={}",
            self.base_url,
            Self::dataset_for_tier(tier),
            bbox.min().y,
            bbox.max().y,
            bbox.min().x,
            bbox.max().x,
            self.api_key
        ))
    }
}

impl DemProvider for OpenTopographyProvider {
    fn fetch(&self, aoi: &AreaOfInterest, tier: u8, dest: &Path) -> Result<()> {
        let url = self.request_url(aoi, tier)?;
        log::debug!("GET {}", redact(&url));
        let bytes = self.fetcher.get_bytes(&url)?.ok_or_else(|| BasinError::ToolFailed {
            tool: "OpenTopography".into(),
            reason: format!("no DEM returned for {}", redact(&url)),
        })?;
        // the API answers errors with text bodies and a 200 status
        read_geotiff_from_buffer(&bytes).map_err(|e| BasinError::ToolFailed {
            tool: "OpenTopography".into(),
            reason: format!("response is not a GeoTIFF: {}", e),
        })?;
        fs::write(dest, &bytes)?;
        Ok(())
    }
}
