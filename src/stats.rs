use crate::raster::{read_raster, DynRaster, RasterError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Surface water extent of a binary mask. Column order is the CSV header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterSummary {
    pub water_pixels: u64,
    pub pixel_area_m2: f64,
    pub total_water_area_m2: f64,
}

/// Counts pixels equal to 1 in band 1 and scales by the pixel footprint.
///
/// Areas are only square metres when the CRS has metre units; a geographic
/// CRS is reported but not rejected.
pub fn summarize_mask(mask: &DynRaster) -> Result<WaterSummary, RasterError> {
    let georef = mask.georef();
    if let Some(crs) = georef.crs.filter(|crs| crs.is_geographic()) {
        warn!("{crs} has angular units, pixel areas will not be square metres");
    }
    let water_pixels = mask
        .band_as::<f64>(0)?
        .iter()
        .filter(|v| **v == 1.0)
        .count() as u64;
    let pixel_area_m2 = georef.transform.pixel_area();
    Ok(WaterSummary {
        water_pixels,
        pixel_area_m2,
        total_water_area_m2: water_pixels as f64 * pixel_area_m2,
    })
}

/// Reads a water mask GeoTIFF and writes its summary as a one-row CSV.
pub fn summarize_water<P: AsRef<Path>, Q: AsRef<Path>>(
    mask_path: P,
    out_csv: Q,
) -> Result<WaterSummary, StatsError> {
    let out_csv = out_csv.as_ref();
    let summary = summarize_mask(&read_raster(mask_path.as_ref())?)?;
    if let Some(parent) = out_csv.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(out_csv)?;
    writer.serialize(&summary)?;
    writer.flush()?;
    info!(
        "{} water pixels, {:.1} m2 total, written to {}",
        summary.water_pixels,
        summary.total_water_area_m2,
        out_csv.display()
    );
    Ok(summary)
}
