//! Surface water mapping from Landsat and Sentinel-2 GeoTIFFs: NDWI,
//! AOI clipping, change detection, water statistics and quicklooks,
//! on top of a pure Rust GeoTIFF reader and writer.

use std::io::{Read, Seek};

pub mod acquire;
pub mod align;
pub mod change;
pub mod clip;
pub mod compression;
pub mod config;
mod error;
pub mod geotags;
pub mod ndwi;
pub mod pipeline;
pub mod projection;
#[cfg(feature = "image")]
pub mod quicklook;
pub mod raster;
pub mod report;
pub mod stats;
pub mod tiff;
pub mod tiles;

pub use error::{WaterlineError, WaterlineResult};
pub use raster::{read_raster, write_raster, DynRaster, GeoReference, Raster};

use geotags::GeoTags;
use tiff::Tiff;

/// Human readable dump of a GeoTIFF's first IFD and geo keys.
pub fn disect<R: Read + Seek>(stream: &mut R) -> WaterlineResult<String> {
    let tiff = Tiff::open(stream)?;
    let mut out = format!("{tiff}");

    let geo = GeoTags::parse(tiff.ifd0()?)?;
    out.push_str(&format!("{geo}\n"));
    match geo.affine() {
        Ok(affine) => out.push_str(&format!("Transform:\n{affine}\n")),
        Err(e) => out.push_str(&format!("Transform: {e}\n")),
    }
    match geo.epsg() {
        Some(epsg) => out.push_str(&format!("CRS: EPSG:{epsg}\n")),
        None => out.push_str("CRS: unknown\n"),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Crs;
    use crate::raster::{Affine, WriteOptions};
    use ndarray::array;
    use std::fs::File;
    use std::io::BufReader;

    #[test]
    fn test_disect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");
        let raster = Raster::from_band(
            array![[1u8, 0], [0, 1]],
            GeoReference::new(
                Some(Crs::from_epsg(32615).unwrap()),
                Affine::new(30.0, 0.0, 600000.0, 0.0, -30.0, 6230000.0),
            ),
            Some(0.0),
        );
        write_raster(&path, &raster, &WriteOptions::default()).unwrap();

        let text = disect(&mut BufReader::new(File::open(&path).unwrap())).unwrap();
        assert!(text.contains("IFD 0"));
        assert!(text.contains("CRS: EPSG:32615"));
        assert!(text.contains("600000"));
    }
}
