// https://en.wikipedia.org/wiki/TIFF#TIFF_Compression_Tag
// https://www.awaresystems.be/imaging/tiff/tifftags/predictor.html

use crate::tiff::Endian;
use num_enum::{FromPrimitive, IntoPrimitive};
use salzweg::decoder::{DecodingError, TiffStyleDecoder};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("LZW decoding failed: {0:?}")]
    LzwError(DecodingError),

    #[error("compression {0:?} is not supported")]
    CompressionNotSupported(Compression),

    #[error("predictor {0:?} is not supported")]
    PredictorNotSupported(Predictor),

    #[error("predictor {0:?} does not support {1}-bit samples")]
    BitDepthNotSupported(Predictor, usize),

    #[error("deflate stream error: {0}")]
    IoError(#[from] io::Error),
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Compression {
    Uncompressed = 1,
    CCITT1D = 2,
    T4Group3Fax = 3,
    T6Group4Fax = 4,
    Lzw = 5,
    JpegOld = 6,
    Jpeg = 7,
    DeflateAdobe = 8,
    PackBits = 32773,
    Deflate = 32946,
    JPEG2000 = 34712,
    ESRILerc = 34887,
    LZMA2 = 34925,
    Zstd = 34926,
    WebP = 34927,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Compression {
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::Lzw => TiffStyleDecoder::decode_to_vec(bytes).map_err(CompressionError::LzwError),
            Self::DeflateAdobe | Self::Deflate => {
                let mut buf = vec![];
                flate2::read::ZlibDecoder::new(bytes).read_to_end(&mut buf)?;
                Ok(buf)
            }
            other => Err(CompressionError::CompressionNotSupported(*other)),
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::DeflateAdobe | Self::Deflate => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(bytes)?;
                Ok(encoder.finish()?)
            }
            other => Err(CompressionError::CompressionNotSupported(*other)),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Predictor {
    No = 1,
    Horizontal = 2,
    FloatingPoint = 3,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Predictor {
    /// Undoes the predictor in place over a buffer of whole rows.
    ///
    /// Returns the byte order of the samples afterwards: the floating point
    /// predictor reassembles samples little-endian regardless of the file.
    pub fn predict(
        &self,
        buffer: &mut [u8],
        width: usize,
        bit_depth: usize,
        samples_per_pixel: usize,
        endian: Endian,
    ) -> Result<Endian, CompressionError> {
        let bytes_per_sample = bit_depth / 8;
        let row_bytes = width * samples_per_pixel * bytes_per_sample;
        if row_bytes == 0 {
            return Ok(endian);
        }
        match self {
            Self::No => Ok(endian),
            Self::Horizontal => {
                for row in buffer.chunks_exact_mut(row_bytes) {
                    match bit_depth {
                        8 => {
                            for i in samples_per_pixel..row.len() {
                                row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
                            }
                        }
                        16 => accumulate::<2, u16>(row, samples_per_pixel, endian, u16::wrapping_add),
                        32 => accumulate::<4, u32>(row, samples_per_pixel, endian, u32::wrapping_add),
                        64 => accumulate::<8, u64>(row, samples_per_pixel, endian, u64::wrapping_add),
                        other => {
                            return Err(CompressionError::BitDepthNotSupported(*self, other))
                        }
                    }
                }
                Ok(endian)
            }
            Self::FloatingPoint => {
                if !matches!(bit_depth, 16 | 32 | 64) {
                    return Err(CompressionError::BitDepthNotSupported(*self, bit_depth));
                }
                let words = width * samples_per_pixel;
                for row in buffer.chunks_exact_mut(row_bytes) {
                    for i in samples_per_pixel..row.len() {
                        row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
                    }
                    // Byte planes are stored most significant first
                    let planes = row.to_vec();
                    for w in 0..words {
                        for b in 0..bytes_per_sample {
                            row[bytes_per_sample * w + b] =
                                planes[(bytes_per_sample - b - 1) * words + w];
                        }
                    }
                }
                Ok(Endian::Little)
            }
            other => Err(CompressionError::PredictorNotSupported(*other)),
        }
    }
}

fn accumulate<const N: usize, T>(
    row: &mut [u8],
    stride: usize,
    endian: Endian,
    add: fn(T, T) -> T,
) where
    T: eio::FromBytes<N> + eio::ToBytes<N> + Copy,
{
    let Some(mut values) = endian.decode_all::<N, T>(row) else {
        return;
    };
    for i in stride..values.len() {
        values[i] = add(values[i], values[i - stride]);
    }
    row.copy_from_slice(&endian.encode_all(&values));
}
