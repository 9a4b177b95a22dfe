//! Resample a raster onto another raster's grid.

use crate::projection::Transformer;
use crate::raster::{read_raster, write_raster, GeoReference, Raster, RasterError, Sample, WriteOptions};
use ndarray::Array2;
use std::path::Path;
use tracing::*;

/// Bilinear sample at fractional pixel position (col, row), pixel corners
/// at integers. NaN outside the raster or next to nodata.
fn bilinear<T: Sample>(band: &Array2<T>, nodata: Option<f64>, col: f64, row: f64) -> f32 {
    let (height, width) = band.dim();
    if !(col >= 0.0 && row >= 0.0 && col <= width as f64 && row <= height as f64) {
        return f32::NAN;
    }
    let x = (col - 0.5).clamp(0.0, (width - 1) as f64);
    let y = (row - 0.5).clamp(0.0, (height - 1) as f64);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let neighbours = [
        (y0, x0, (1.0 - fx) * (1.0 - fy)),
        (y0, x1, fx * (1.0 - fy)),
        (y1, x0, (1.0 - fx) * fy),
        (y1, x1, fx * fy),
    ];
    let mut acc = 0.0;
    for (r, c, w) in neighbours {
        if w == 0.0 {
            continue;
        }
        let v = band[(r, c)].to_f64();
        if nodata.is_some_and(|nodata| crate::raster::same_value(v, nodata)) || !v.is_finite() {
            return f32::NAN;
        }
        acc += v * w;
    }
    acc as f32
}

/// Resamples every band of `src` onto `reference`'s CRS, transform and
/// `(rows, cols)` shape. Output is `f32` with NaN nodata.
pub fn reproject_to_match<T: Sample>(
    src: &Raster<T>,
    reference: &GeoReference,
    shape: (usize, usize),
) -> Result<Raster<f32>, RasterError> {
    let transformer = Transformer::new(reference.crs()?, src.georef.crs()?)?;
    let src_transform = src.transform();
    let (rows, cols) = shape;
    if src.width() == 0 || src.height() == 0 {
        return Err(RasterError::Empty);
    }

    // Source pixel position for every reference pixel centre
    let mut positions = Array2::from_elem(shape, (f64::NAN, f64::NAN));
    for ((r, c), position) in positions.indexed_iter_mut() {
        let (x, y) = reference.transform.apply(c as f64 + 0.5, r as f64 + 0.5);
        if let Ok((sx, sy)) = transformer.transform(x, y) {
            if let Some(pixel) = src_transform.invert(sx, sy) {
                *position = pixel;
            }
        }
    }
    debug!(
        "Resampling {}x{} {} onto {cols}x{rows}",
        src.width(),
        src.height(),
        src.georef.crs()?
    );

    let bands = src
        .bands
        .iter()
        .map(|band| positions.mapv(|(col, row)| bilinear(band, src.nodata, col, row)))
        .collect();
    Raster::new(bands, *reference, Some(f64::NAN))
}

/// Aligns `src_path` to the grid of `reference_path` and writes the result.
pub fn align_file<P: AsRef<Path>, R: AsRef<Path>, O: AsRef<Path>>(
    src_path: P,
    reference_path: R,
    out_path: O,
) -> Result<Raster<f32>, RasterError> {
    let src = read_raster(src_path.as_ref())?;
    let reference = read_raster(reference_path.as_ref())?;
    let aligned = crate::raster::dispatch!(&src, r => {
        reproject_to_match(r, reference.georef(), reference.shape())?
    });
    write_raster(out_path.as_ref(), &aligned, &WriteOptions::default())?;
    info!(
        "Aligned {} to {}, wrote {}",
        src_path.as_ref().display(),
        reference_path.as_ref().display(),
        out_path.as_ref().display()
    );
    Ok(aligned)
}
