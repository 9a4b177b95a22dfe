use super::{
    DynRaster, ExtraSamples, PhotometricInterpretation, PlanarConfiguration, Raster, RasterError,
    Sample,
};
use crate::compression::Compression;
use crate::geotags::GeoTags;
use crate::tiff::{Endian, TagData, TagId, Tiff, Variant};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::*;

/// Strips are sized to roughly this many uncompressed bytes.
const TARGET_STRIP_BYTES: usize = 256 * 1024;

/// Classic TIFF offsets are 32-bit; leave headroom for the IFD.
const BIGTIFF_THRESHOLD: usize = 0xF000_0000;

#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub compression: Compression,
    pub rows_per_strip: Option<usize>,
    pub endian: Endian,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::DeflateAdobe,
            rows_per_strip: None,
            endian: Endian::Little,
        }
    }
}

/// Writes a stripped, pixel-interleaved GeoTIFF, creating parent directories.
pub fn write_raster<T: Sample, P: AsRef<Path>>(
    path: P,
    raster: &Raster<T>,
    options: &WriteOptions,
) -> Result<(), RasterError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let endian = options.endian;
    let (height, width) = raster.shape();
    let spp = raster.band_count();
    let bytes_per_row = width * spp * (T::BITS as usize / 8);
    let rows_per_strip = options
        .rows_per_strip
        .unwrap_or(TARGET_STRIP_BYTES / bytes_per_row.max(1))
        .clamp(1, height.max(1));
    let variant = if bytes_per_row * height > BIGTIFF_THRESHOLD {
        Variant::Big
    } else {
        Variant::Normal
    };

    // Interleave and compress strips
    let mut strips = Vec::with_capacity(height.div_ceil(rows_per_strip));
    let mut row_start = 0;
    while row_start < height {
        let rows = rows_per_strip.min(height - row_start);
        let mut samples = Vec::with_capacity(rows * width * spp);
        for y in row_start..row_start + rows {
            for x in 0..width {
                samples.extend(raster.bands.iter().map(|band| band[(y, x)]));
            }
        }
        strips.push(
            options
                .compression
                .encode(&T::encode_all(endian, &samples))?,
        );
        row_start += rows;
    }

    // Image tags
    let mut tiff = Tiff::new(endian, variant);
    let ifd = tiff.ifd0_mut()?;
    let spp16 = spp as u16;
    ifd.set_tag(TagId::ImageWidth, TagData::from_long(width as u32), endian);
    ifd.set_tag(TagId::ImageHeight, TagData::from_long(height as u32), endian);
    ifd.set_tag(
        TagId::BitsPerSample,
        TagData::Short(vec![T::BITS; spp]),
        endian,
    );
    ifd.set_tag(
        TagId::Compression,
        TagData::from_short(options.compression.into()),
        endian,
    );
    ifd.set_tag(
        TagId::PhotometricInterpretation,
        TagData::from_short(PhotometricInterpretation::BlackIsZero.into()),
        endian,
    );
    ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(spp16), endian);
    ifd.set_tag(
        TagId::RowsPerStrip,
        TagData::from_long(rows_per_strip as u32),
        endian,
    );
    ifd.set_tag(
        TagId::PlanarConfiguration,
        TagData::from_short(PlanarConfiguration::Chunky.into()),
        endian,
    );
    ifd.set_tag(
        TagId::SampleFormat,
        TagData::Short(vec![T::FORMAT.into(); spp]),
        endian,
    );
    if spp > 1 {
        ifd.set_tag(
            TagId::ExtraSamples,
            TagData::Short(vec![ExtraSamples::Unspecified.into(); spp - 1]),
            endian,
        );
    }
    ifd.set_tag(
        TagId::Software,
        TagData::from_string(concat!("waterline ", env!("CARGO_PKG_VERSION"))),
        endian,
    );
    if let Some(nodata) = raster.nodata {
        ifd.set_tag(
            TagId::GDALNoData,
            TagData::from_string(&format_nodata(nodata)),
            endian,
        );
    }

    // Georeferencing
    let georef = &raster.georef;
    let geographic = georef.crs.map(|crs| crs.is_geographic()).unwrap_or(false);
    GeoTags::from_affine(
        &georef.transform,
        georef.crs.map(|crs| crs.epsg()),
        geographic,
    )
    .add_to_ifd(ifd, endian);

    debug!(
        "Writing {}: {}x{}x{} {:?}, {} strip(s)",
        path.display(),
        width,
        height,
        spp,
        options.compression,
        strips.len()
    );
    let mut writer = BufWriter::new(File::create(path)?);
    tiff.encode(
        &mut writer,
        &strips,
        TagId::StripOffsets,
        TagId::StripByteCounts,
    )?;
    writer.flush()?;
    Ok(())
}

impl DynRaster {
    pub fn write<P: AsRef<Path>>(&self, path: P, options: &WriteOptions) -> Result<(), RasterError> {
        super::dispatch!(self, r => write_raster(path, r, options))
    }
}

/// GDAL style nodata text.
fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        format!("{nodata}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Crs;
    use crate::raster::{read_raster, Affine, GeoReference};
    use ndarray::array;

    fn utm_georef() -> GeoReference {
        GeoReference::new(
            Some(Crs::from_epsg(32615).unwrap()),
            Affine::new(30.0, 0.0, 600000.0, 0.0, -30.0, 6230000.0),
        )
    }

    #[test]
    fn test_write_then_read_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/ndwi.tif");
        let raster = Raster::from_band(
            array![[0.5f32, -0.25, f32::NAN], [1.0, 0.0, -1.0]],
            utm_georef(),
            Some(f64::NAN),
        );
        write_raster(&path, &raster, &WriteOptions::default()).unwrap();

        let read = match read_raster(&path).unwrap() {
            DynRaster::F32(r) => r,
            other => panic!("unexpected sample type: {other}"),
        };
        assert_eq!(read.georef, raster.georef);
        assert!(read.nodata.unwrap().is_nan());
        assert_eq!(read.bands[0][(0, 0)], 0.5);
        assert_eq!(read.bands[0][(1, 2)], -1.0);
        assert!(read.bands[0][(0, 2)].is_nan());
    }

    #[test]
    fn test_multiband_uncompressed_small_strips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        let raster = Raster::new(
            vec![
                array![[1i16, 2], [3, 4], [5, 6]],
                array![[-1i16, -2], [-3, -4], [-5, -6]],
            ],
            utm_georef(),
            Some(-9999.0),
        )
        .unwrap();
        let options = WriteOptions {
            compression: Compression::Uncompressed,
            rows_per_strip: Some(2),
            endian: Endian::Big,
        };
        write_raster(&path, &raster, &options).unwrap();

        let read = read_raster(&path).unwrap();
        assert_eq!(read.band_count(), 2);
        assert_eq!(read.nodata(), Some(-9999.0));
        assert_eq!(read, DynRaster::I16(raster));
    }
}
