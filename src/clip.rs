//! Clip rasters to an area of interest given in WGS84 lon/lat.

use crate::projection::{Crs, ProjectionError, Transformer};
use crate::raster::{read_raster, DynRaster, Raster, RasterError, Sample, WriteOptions};
use geo::{BoundingRect, Contains, Coord, LineString, MapCoords, Point, Polygon};
use ndarray::{s, Array2};
use std::path::Path;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum ClipError {
    #[error("AOI needs at least 3 distinct vertices, got {0}")]
    DegenerateAoi(usize),

    #[error("AOI does not overlap the raster extent")]
    NoOverlap,

    #[error("raster transform is not invertible")]
    SingularTransform,

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Closed polygon from a lon/lat ring, closing it if needed.
pub fn aoi_polygon(ring: &[[f64; 2]]) -> Result<Polygon<f64>, ClipError> {
    let mut coords: Vec<Coord<f64>> = ring.iter().map(|[x, y]| Coord { x: *x, y: *y }).collect();
    if coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(ClipError::DegenerateAoi(coords.len()));
    }
    Ok(Polygon::new(LineString::from(coords), vec![]))
}

/// Reprojects every vertex of a WGS84 polygon into `crs`.
pub fn reproject_aoi(aoi: &Polygon<f64>, crs: &Crs) -> Result<Polygon<f64>, ClipError> {
    let transformer = Transformer::new(&Crs::wgs84(), crs)?;
    let transformer = &transformer;
    let projected = aoi.try_map_coords(|Coord { x, y }| {
        transformer.transform(x, y).map(|(x, y)| Coord { x, y })
    })?;
    Ok(projected)
}

/// Pixel window (col0, row0, col1, row1) covering the polygon bounds,
/// rounded outward and intersected with the raster extent.
fn pixel_window<T: Sample>(
    src: &Raster<T>,
    polygon: &Polygon<f64>,
) -> Result<(usize, usize, usize, usize), ClipError> {
    let bounds = polygon.bounding_rect().ok_or(ClipError::NoOverlap)?;
    let transform = src.transform();
    let (min, max) = (bounds.min(), bounds.max());
    let corners = [
        (min.x, min.y),
        (min.x, max.y),
        (max.x, min.y),
        (max.x, max.y),
    ];

    let mut cols = (f64::INFINITY, f64::NEG_INFINITY);
    let mut rows = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let (col, row) = transform
            .invert(x, y)
            .ok_or(ClipError::SingularTransform)?;
        cols = (cols.0.min(col), cols.1.max(col));
        rows = (rows.0.min(row), rows.1.max(row));
    }

    let (height, width) = src.shape();
    let col0 = cols.0.floor().max(0.0);
    let row0 = rows.0.floor().max(0.0);
    let col1 = cols.1.ceil().min(width as f64);
    let row1 = rows.1.ceil().min(height as f64);
    if col1 <= col0 || row1 <= row0 {
        return Err(ClipError::NoOverlap);
    }
    Ok((col0 as usize, row0 as usize, col1 as usize, row1 as usize))
}

/// Crops `src` to the AOI bounds and blanks pixels whose centre falls
/// outside the AOI with the source nodata value, or 0 without one.
pub fn clip_raster<T: Sample>(src: &Raster<T>, aoi: &Polygon<f64>) -> Result<Raster<T>, ClipError> {
    let crs = src.georef.crs()?;
    let polygon = reproject_aoi(aoi, crs)?;
    let (col0, row0, col1, row1) = pixel_window(src, &polygon)?;
    debug!("Clip window cols {col0}..{col1}, rows {row0}..{row1} of {crs} raster");

    let transform = src.transform();
    let inside = Array2::from_shape_fn((row1 - row0, col1 - col0), |(r, c)| {
        let (x, y) = transform.apply((col0 + c) as f64 + 0.5, (row0 + r) as f64 + 0.5);
        polygon.contains(&Point::new(x, y))
    });
    let fill = T::from_f64(src.nodata.unwrap_or(0.0));

    let bands = src
        .bands
        .iter()
        .map(|band| {
            let mut window = band.slice(s![row0..row1, col0..col1]).to_owned();
            window.zip_mut_with(&inside, |v, keep| {
                if !keep {
                    *v = fill;
                }
            });
            window
        })
        .collect();

    let mut georef = src.georef;
    georef.transform = transform.translated_pixels(col0 as f64, row0 as f64);
    Ok(Raster::new(bands, georef, src.nodata)?)
}

/// Clips one GeoTIFF to the AOI, keeping its sample type and band count.
pub fn clip_file<P: AsRef<Path>, Q: AsRef<Path>>(
    infile: P,
    outfile: Q,
    aoi: &Polygon<f64>,
) -> Result<(), ClipError> {
    let (infile, outfile) = (infile.as_ref(), outfile.as_ref());
    let src = read_raster(infile)?;
    let clipped: DynRaster = crate::raster::dispatch!(&src, r => clip_raster(r, aoi)?.into());
    clipped.write(outfile, &WriteOptions::default())?;
    let (rows, cols) = clipped.shape();
    info!(
        "Clipped {} to {cols}x{rows}, wrote {}",
        infile.display(),
        outfile.display()
    );
    Ok(())
}

/// Exterior ring as `(lon, lat)` pairs for log lines.
pub fn describe_aoi(aoi: &Polygon<f64>) -> String {
    aoi.exterior()
        .coords()
        .map(|c| format!("({:.4}, {:.4})", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ")
}
