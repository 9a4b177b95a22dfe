#![cfg(feature = "image")]

use crate::raster::{read_raster, RasterError};
use image::GrayImage;
use ndarray::Array2;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::*;

const LOW_PERCENTILE: f64 = 2.0;
const HIGH_PERCENTILE: f64 = 98.0;
const STRETCH_EPSILON: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum QuicklookError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("raster too large for a quicklook: {0}x{1}")]
    TooLarge(usize, usize),
}

/// Percentile of the finite values with linear interpolation between
/// closest ranks. `None` when nothing is finite.
pub fn percentile(values: &[f32], q: f64) -> Option<f32> {
    let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let rank = (finite.len() - 1) as f64 * q.clamp(0.0, 100.0) / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Stretch range for display, [0, 1] when the raster has no finite pixels.
pub fn stretch_range(values: &Array2<f32>) -> (f32, f32) {
    let flat: Vec<f32> = values.iter().copied().collect();
    match (
        percentile(&flat, LOW_PERCENTILE),
        percentile(&flat, HIGH_PERCENTILE),
    ) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => (0.0, 1.0),
    }
}

/// Linear 2-98% stretch into [0, 1]. Non-finite pixels map to 0.
pub fn stretch(values: &Array2<f32>) -> Array2<f32> {
    let (lo, hi) = stretch_range(values);
    values.mapv(|v| {
        if v.is_finite() {
            ((v - lo) / (hi - lo + STRETCH_EPSILON)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    })
}

pub fn to_gray_image(stretched: &Array2<f32>) -> Result<GrayImage, QuicklookError> {
    let (rows, cols) = stretched.dim();
    let too_large = || QuicklookError::TooLarge(cols, rows);
    let width = u32::try_from(cols).map_err(|_| too_large())?;
    let height = u32::try_from(rows).map_err(|_| too_large())?;
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let v = stretched[(y as usize, x as usize)];
        image::Luma([(v * 255.0).round() as u8])
    }))
}

/// Renders band 1 of a raster as an 8-bit grayscale PNG.
pub fn save_quicklook<P: AsRef<Path>, Q: AsRef<Path>>(
    raster_path: P,
    out_png: Q,
) -> Result<(), QuicklookError> {
    let out_png = out_png.as_ref();
    let band = read_raster(raster_path.as_ref())?.band_as::<f32>(0)?;
    let (lo, hi) = stretch_range(&band);
    debug!("Stretching {} to [{lo}, {hi}]", raster_path.as_ref().display());

    let image = to_gray_image(&stretch(&band))?;
    if let Some(parent) = out_png.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    image.save_with_format(out_png, image::ImageFormat::Png)?;
    info!("Wrote quicklook to {}", out_png.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        assert_eq!(percentile(&values, 2.0), Some(2.0));
        assert_eq!(percentile(&values, 98.0), Some(98.0));
        assert_abs_diff_eq!(percentile(&[0.0, 1.0], 50.0).unwrap(), 0.5);
        assert_eq!(percentile(&[f32::NAN], 50.0), None);
    }

    #[test]
    fn test_all_nan_uses_unit_range() {
        let values = array![[f32::NAN, f32::INFINITY]];
        assert_eq!(stretch_range(&values), (0.0, 1.0));
        assert_eq!(stretch(&values), array![[0.0f32, 0.0]]);
    }

    #[test]
    fn test_stretch_is_clamped() {
        let values: Array2<f32> =
            Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let stretched = stretch(&values);
        assert_eq!(stretched[(0, 0)], 0.0);
        assert_eq!(stretched[(9, 9)], 1.0);
        assert!(stretched.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let tif = dir.path().join("ndwi.tif");
        let png = dir.path().join("png/ndwi.png");
        let raster = crate::raster::Raster::from_band(
            array![[-1.0f32, 0.0], [0.5, f32::NAN]],
            Default::default(),
            Some(f64::NAN),
        );
        crate::raster::write_raster(&tif, &raster, &Default::default()).unwrap();

        save_quicklook(&tif, &png).unwrap();
        let image = image::open(&png).unwrap().to_luma8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 1).0, [0]);
        assert_eq!(image.get_pixel(0, 1).0, [255]);
    }
}
