use super::{
    Affine, DynRaster, GeoReference, PlanarConfiguration, Raster, RasterError, Sample,
    SampleFormat,
};
use crate::compression::{Compression, Predictor};
use crate::geotags::{GeoTiffError, GeoTags};
use crate::projection::Crs;
use crate::tiff::{Endian, Ifd, TagId, Tiff};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::*;

/// Opens a GeoTIFF and loads every band of its first image into memory.
pub fn read_raster<P: AsRef<Path>>(path: P) -> Result<DynRaster, RasterError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let stream = &mut BufReader::new(file);
    let tiff = Tiff::open(stream)?;
    let ifd = tiff.ifd0()?;

    let layout = Layout::from_ifd(ifd)?;
    let georef = georeference(ifd)?;
    let nodata = ifd
        .get_tag(TagId::GDALNoData)
        .ok()
        .and_then(|tag| tag.try_to_string())
        .and_then(|s| s.trim().parse::<f64>().ok());
    debug!(
        "Reading {}: {}x{}x{} {:?} {}-bit, {:?}, {:?}",
        path.display(),
        layout.width,
        layout.height,
        layout.samples_per_pixel,
        layout.sample_format,
        layout.bits_per_sample,
        layout.compression,
        layout.predictor
    );

    let endian = tiff.endian;
    let raster = match (layout.sample_format, layout.bits_per_sample) {
        (SampleFormat::Unsigned, 8) => layout.read::<u8, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Signed, 8) => layout.read::<i8, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Unsigned, 16) => layout.read::<u16, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Signed, 16) => layout.read::<i16, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Unsigned, 32) => layout.read::<u32, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Signed, 32) => layout.read::<i32, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Float, 32) => layout.read::<f32, _>(stream, endian, georef, nodata)?.into(),
        (SampleFormat::Float, 64) => layout.read::<f64, _>(stream, endian, georef, nodata)?.into(),
        (format, bits) => {
            return Err(RasterError::NotSupported(format!(
                "{bits}-bit {format:?} samples"
            )))
        }
    };
    Ok(raster)
}

fn georeference(ifd: &Ifd) -> Result<GeoReference, RasterError> {
    let geo = match GeoTags::parse(ifd) {
        Ok(geo) => geo,
        Err(GeoTiffError::MissingTag(_)) => {
            warn!("TIFF has no georeferencing, using pixel coordinates");
            return Ok(GeoReference::new(None, Affine::identity()));
        }
        Err(e) => return Err(e.into()),
    };
    let crs = match geo.epsg() {
        Some(epsg) => Some(Crs::from_epsg(epsg)?),
        None => {
            warn!("GeoTIFF has no EPSG coordinate system key");
            None
        }
    };
    Ok(GeoReference::new(crs, geo.affine()?))
}

#[derive(Clone, Copy, Debug)]
enum Chunking {
    Strips { rows_per_strip: usize },
    Tiles { width: usize, height: usize },
}

#[derive(Clone, Debug)]
struct Layout {
    width: usize,
    height: usize,
    samples_per_pixel: usize,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    planar: PlanarConfiguration,
    compression: Compression,
    predictor: Predictor,
    chunking: Chunking,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl Layout {
    fn from_ifd(ifd: &Ifd) -> Result<Self, RasterError> {
        // Required tags
        let width: usize = ifd.get_tag_value(TagId::ImageWidth)?;
        let height: usize = ifd.get_tag_value(TagId::ImageHeight)?;
        let compression = ifd.get_tag_value::<u16>(TagId::Compression)?.into();

        // Optional tags with TIFF defaults
        let samples_per_pixel: usize = ifd.get_tag_value(TagId::SamplesPerPixel).unwrap_or(1);
        let predictor = ifd
            .get_tag_value::<u16>(TagId::Predictor)
            .unwrap_or(1)
            .into();
        let planar = ifd
            .get_tag_value::<u16>(TagId::PlanarConfiguration)
            .unwrap_or(1)
            .into();
        let bits: Vec<u16> = ifd
            .get_tag_values(TagId::BitsPerSample)
            .unwrap_or_else(|_| vec![1]);
        let formats: Vec<u16> = ifd
            .get_tag_values(TagId::SampleFormat)
            .unwrap_or_else(|_| vec![1]);

        let bits_per_sample = bits[0];
        if bits.iter().any(|b| *b != bits_per_sample) {
            return Err(RasterError::NotSupported(format!(
                "mixed bits per sample {bits:?}"
            )));
        }
        let sample_format = SampleFormat::from(formats[0]);
        if formats.iter().any(|f| *f != formats[0]) {
            return Err(RasterError::NotSupported(format!(
                "mixed sample formats {formats:?}"
            )));
        }

        let (chunking, offsets, byte_counts) = match ifd.get_tag_values(TagId::TileOffsets) {
            Ok(offsets) => (
                Chunking::Tiles {
                    width: ifd.get_tag_value(TagId::TileWidth)?,
                    height: ifd.get_tag_value(TagId::TileLength)?,
                },
                offsets,
                ifd.get_tag_values(TagId::TileByteCounts)?,
            ),
            Err(_) => (
                Chunking::Strips {
                    rows_per_strip: ifd
                        .get_tag_value::<usize>(TagId::RowsPerStrip)
                        .unwrap_or(height)
                        .clamp(1, height.max(1)),
                },
                ifd.get_tag_values(TagId::StripOffsets)?,
                ifd.get_tag_values(TagId::StripByteCounts)?,
            ),
        };

        let layout = Self {
            width,
            height,
            samples_per_pixel,
            bits_per_sample,
            sample_format,
            planar,
            compression,
            predictor,
            chunking,
            offsets,
            byte_counts,
        };
        if layout.offsets.len() != layout.byte_counts.len()
            || layout.offsets.len() < layout.expected_chunks()
        {
            return Err(RasterError::Tiff(crate::tiff::TiffError::BadTag(
                match chunking {
                    Chunking::Strips { .. } => TagId::StripOffsets,
                    Chunking::Tiles { .. } => TagId::TileOffsets,
                },
            )));
        }
        Ok(layout)
    }

    /// Samples interleaved inside each chunk.
    fn chunk_samples(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Planar => 1,
            _ => self.samples_per_pixel,
        }
    }

    /// (columns, rows) of the chunk grid for one plane.
    fn grid(&self) -> (usize, usize) {
        match self.chunking {
            Chunking::Strips { rows_per_strip } => (1, self.height.div_ceil(rows_per_strip)),
            Chunking::Tiles { width, height } => {
                (self.width.div_ceil(width), self.height.div_ceil(height))
            }
        }
    }

    fn expected_chunks(&self) -> usize {
        let (across, down) = self.grid();
        let planes = match self.planar {
            PlanarConfiguration::Planar => self.samples_per_pixel,
            _ => 1,
        };
        across * down * planes
    }

    fn read<T: Sample, R: Read + Seek>(
        &self,
        stream: &mut R,
        endian: Endian,
        georef: GeoReference,
        nodata: Option<f64>,
    ) -> Result<Raster<T>, RasterError> {
        if self.planar == PlanarConfiguration::Unknown {
            return Err(RasterError::NotSupported("unknown planar configuration".into()));
        }
        let mut bands = vec![Array2::<T>::default((self.height, self.width)); self.samples_per_pixel];
        let (across, down) = self.grid();
        let per_plane = across * down;
        let spp = self.chunk_samples();

        for index in 0..self.expected_chunks() {
            let plane = index / per_plane;
            let col = (index % per_plane) % across;
            let row = (index % per_plane) / across;

            // Chunk footprint in image pixels
            let (chunk_width, x0, y0, rows) = match self.chunking {
                Chunking::Strips { rows_per_strip } => {
                    let y0 = row * rows_per_strip;
                    (self.width, 0, y0, rows_per_strip.min(self.height - y0))
                }
                Chunking::Tiles { width, height } => (width, col * width, row * height, height),
            };

            let mut compressed = vec![0; self.byte_counts[index] as usize];
            stream.seek(SeekFrom::Start(self.offsets[index]))?;
            stream.read_exact(&mut compressed)?;
            let mut buffer = self.compression.decode(&compressed)?;
            let sample_endian = self.predictor.predict(
                &mut buffer,
                chunk_width,
                self.bits_per_sample as usize,
                spp,
                endian,
            )?;
            let values = T::decode_all(sample_endian, &buffer).ok_or(RasterError::BufferSize {
                expected: chunk_width * rows * spp,
                found: 0,
            })?;
            if values.len() < chunk_width * rows * spp {
                return Err(RasterError::BufferSize {
                    expected: chunk_width * rows * spp,
                    found: values.len(),
                });
            }

            // Scatter into bands, clipping tiles at the right/bottom edges
            for r in 0..rows {
                let y = y0 + r;
                if y >= self.height {
                    break;
                }
                for c in 0..chunk_width {
                    let x = x0 + c;
                    if x >= self.width {
                        break;
                    }
                    let base = (r * chunk_width + c) * spp;
                    if spp == 1 {
                        bands[plane][(y, x)] = values[base];
                    } else {
                        for (s, band) in bands.iter_mut().enumerate() {
                            band[(y, x)] = values[base + s];
                        }
                    }
                }
            }
        }
        Raster::new(bands, georef, nodata)
    }
}
