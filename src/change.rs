//! Temporal differencing of two co-registered index rasters.

use crate::raster::{read_raster, write_raster, Raster, RasterError, Sample, WriteOptions};
use ndarray::{Array2, Zip};
use std::path::{Path, PathBuf};
use tracing::*;

pub const CHANGE_NODATA: f32 = f32::NAN;
pub const MASK_NODATA: u8 = 0;

/// Pointwise `t2 - t1` in `f32`.
pub fn change_difference<A: Sample, B: Sample>(
    t1: &Array2<A>,
    t2: &Array2<B>,
) -> Result<Array2<f32>, RasterError> {
    if t1.dim() != t2.dim() {
        return Err(RasterError::ShapeMismatch {
            expected: t1.dim(),
            found: t2.dim(),
        });
    }
    Ok(Zip::from(t1)
        .and(t2)
        .map_collect(|a, b| b.to_f32() - a.to_f32()))
}

/// 1 where `|change| >= threshold`, else 0, compared in `f32`. NaN never
/// passes.
pub fn threshold_mask(change: &Array2<f32>, threshold: f64) -> Array2<u8> {
    let threshold = threshold as f32;
    change.mapv(|c| u8::from(c.abs() >= threshold))
}

/// `change.tif` with threshold 0.1 becomes `change_thr0.1.tif`.
pub fn threshold_mask_path(out_path: &Path, threshold: f64) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match out_path.extension() {
        Some(ext) => format!("{stem}_thr{threshold:?}.{}", ext.to_string_lossy()),
        None => format!("{stem}_thr{threshold:?}"),
    };
    out_path.with_file_name(name)
}

#[derive(Clone, Debug)]
pub struct ChangeOutputs {
    pub change: PathBuf,
    pub mask: Option<PathBuf>,
}

/// Differences band 1 of two rasters and writes the result, plus a binary
/// change mask next to it when a threshold is given.
///
/// The rasters are assumed to share a grid; only their shapes are checked.
pub fn change_rasters<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
    t1_path: P,
    t2_path: Q,
    out_path: O,
    threshold: Option<f64>,
) -> Result<ChangeOutputs, RasterError> {
    let out_path = out_path.as_ref();
    let t1 = read_raster(t1_path.as_ref())?;
    let t2 = read_raster(t2_path.as_ref())?;

    let change = change_difference(&t1.band_as::<f32>(0)?, &t2.band_as::<f32>(0)?)?;
    let georef = *t1.georef();

    let mask = match threshold {
        Some(threshold) => {
            let mask = threshold_mask(&change, threshold);
            let changed = mask.iter().filter(|v| **v == 1).count();
            let mask_path = threshold_mask_path(out_path, threshold);
            write_raster(
                &mask_path,
                &Raster::from_band(mask, georef, Some(MASK_NODATA as f64)),
                &WriteOptions::default(),
            )?;
            info!(
                "Wrote change mask ({changed} changed pixels at |change| >= {threshold}) to {}",
                mask_path.display()
            );
            Some(mask_path)
        }
        None => None,
    };

    write_raster(
        out_path,
        &Raster::from_band(change, georef, Some(CHANGE_NODATA as f64)),
        &WriteOptions::default(),
    )?;
    info!("Wrote change raster to {}", out_path.display());

    Ok(ChangeOutputs {
        change: out_path.to_path_buf(),
        mask,
    })
}
