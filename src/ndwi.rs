//! Normalized Difference Water Index (McFeeters, 1996)
//!
//! `NDWI = (Green - NIR) / (Green + NIR)`, evaluated in `f32`.
//! Open water tends toward positive values, vegetation and soil negative.

use crate::raster::{read_raster, write_raster, Raster, RasterError, Sample, WriteOptions};
use ndarray::{Array2, Zip};
use std::path::Path;
use tracing::*;

/// Nodata sentinel written into NDWI rasters.
pub const NDWI_NODATA: f32 = f32::NAN;

/// Elementwise NDWI of two equally shaped bands of any sample type.
///
/// Any pixel whose result is not finite (a zero sum, or NaN inputs) is set
/// to `nodata`. Inputs are left untouched.
pub fn compute_ndwi<G: Sample, N: Sample>(
    green: &Array2<G>,
    nir: &Array2<N>,
    nodata: f32,
) -> Result<Array2<f32>, RasterError> {
    if green.dim() != nir.dim() {
        return Err(RasterError::ShapeMismatch {
            expected: green.dim(),
            found: nir.dim(),
        });
    }
    Ok(Zip::from(green).and(nir).map_collect(|g, n| {
        let g = g.to_f32();
        let n = n.to_f32();
        let ndwi = (g - n) / (g + n);
        if ndwi.is_finite() {
            ndwi
        } else {
            nodata
        }
    }))
}

/// Reads band 1 of the green and NIR GeoTIFFs and writes a single band
/// `f32` NDWI GeoTIFF georeferenced like the green input.
pub fn ndwi_rasters<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
    green_path: P,
    nir_path: Q,
    out_path: O,
) -> Result<Raster<f32>, RasterError> {
    let green = read_raster(green_path.as_ref())?;
    let nir = read_raster(nir_path.as_ref())?;
    if green.georef() != nir.georef() {
        warn!(
            "{} and {} are not on the same grid, computing NDWI pixel by pixel anyway",
            green_path.as_ref().display(),
            nir_path.as_ref().display()
        );
    }

    let ndwi = compute_ndwi(
        &green.band_as::<f32>(0)?,
        &nir.band_as::<f32>(0)?,
        NDWI_NODATA,
    )?;
    let raster = Raster::from_band(ndwi, *green.georef(), Some(NDWI_NODATA as f64));
    write_raster(out_path.as_ref(), &raster, &WriteOptions::default())?;
    info!("Wrote NDWI to {}", out_path.as_ref().display());
    Ok(raster)
}
