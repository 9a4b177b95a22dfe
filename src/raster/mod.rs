use crate::compression::CompressionError;
use crate::geotags::GeoTiffError;
use crate::projection::{Crs, ProjectionError};
use crate::tiff::TiffError;
use ndarray::Array2;
use std::fmt::Display;
use std::io;
use thiserror::Error;

mod affine;
mod photometrics;
mod read;
mod sample;
mod write;

pub use affine::Affine;
pub use photometrics::{ExtraSamples, PhotometricInterpretation, PlanarConfiguration, SampleFormat};
pub use read::read_raster;
pub use sample::{same_value, Sample};
pub use write::{write_raster, WriteOptions};

#[derive(Error, Debug)]
pub enum RasterError {
    #[error(transparent)]
    Tiff(#[from] TiffError),

    #[error(transparent)]
    GeoTiff(#[from] GeoTiffError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("raster I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("shape mismatch: expected {expected:?} (rows, cols), found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("decoded chunk holds {found} samples, expected at least {expected}")]
    BufferSize { expected: usize, found: usize },

    #[error("band {0} out of range, raster has {1} band(s)")]
    BandOutOfRange(usize, usize),

    #[error("raster has no bands")]
    Empty,

    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Where a raster sits on the ground.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GeoReference {
    pub crs: Option<Crs>,
    pub transform: Affine,
}

impl GeoReference {
    pub fn new(crs: Option<Crs>, transform: Affine) -> Self {
        Self { crs, transform }
    }

    pub fn crs(&self) -> Result<&Crs, ProjectionError> {
        self.crs.as_ref().ok_or(ProjectionError::MissingCrs)
    }
}

/// One or more equally shaped bands plus georeferencing.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster<T: Sample> {
    pub bands: Vec<Array2<T>>,
    pub georef: GeoReference,
    pub nodata: Option<f64>,
}

impl<T: Sample> Raster<T> {
    pub fn new(
        bands: Vec<Array2<T>>,
        georef: GeoReference,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        let first = bands.first().ok_or(RasterError::Empty)?;
        let expected = first.dim();
        if let Some(band) = bands.iter().find(|b| b.dim() != expected) {
            return Err(RasterError::ShapeMismatch {
                expected,
                found: band.dim(),
            });
        }
        Ok(Self {
            bands,
            georef,
            nodata,
        })
    }

    pub fn from_band(band: Array2<T>, georef: GeoReference, nodata: Option<f64>) -> Self {
        Self {
            bands: vec![band],
            georef,
            nodata,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands.first().map(|b| b.dim()).unwrap_or((0, 0))
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn height(&self) -> usize {
        self.shape().0
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, index: usize) -> Result<&Array2<T>, RasterError> {
        self.bands
            .get(index)
            .ok_or(RasterError::BandOutOfRange(index, self.bands.len()))
    }

    pub fn transform(&self) -> &Affine {
        &self.georef.transform
    }

    pub fn is_nodata(&self, value: T) -> bool {
        self.nodata
            .map(|nodata| same_value(value.to_f64(), nodata))
            .unwrap_or(false)
    }
}

impl<T: Sample> Display for Raster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let crs = match &self.georef.crs {
            Some(crs) => crs.to_string(),
            None => "no CRS".to_string(),
        };
        write!(
            f,
            "Raster({}x{}, {} band(s), {:?} {}-bit, {}, nodata {:?})",
            self.width(),
            self.height(),
            self.band_count(),
            T::FORMAT,
            T::BITS,
            crs,
            self.nodata
        )
    }
}

/// A raster whose sample type is only known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum DynRaster {
    U8(Raster<u8>),
    I8(Raster<i8>),
    U16(Raster<u16>),
    I16(Raster<i16>),
    U32(Raster<u32>),
    I32(Raster<i32>),
    F32(Raster<f32>),
    F64(Raster<f64>),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            $crate::raster::DynRaster::U8($r) => $body,
            $crate::raster::DynRaster::I8($r) => $body,
            $crate::raster::DynRaster::U16($r) => $body,
            $crate::raster::DynRaster::I16($r) => $body,
            $crate::raster::DynRaster::U32($r) => $body,
            $crate::raster::DynRaster::I32($r) => $body,
            $crate::raster::DynRaster::F32($r) => $body,
            $crate::raster::DynRaster::F64($r) => $body,
        }
    };
}
pub(crate) use dispatch;

macro_rules! impl_from_raster {
    ($t:ty, $variant:ident) => {
        impl From<Raster<$t>> for DynRaster {
            fn from(raster: Raster<$t>) -> Self {
                DynRaster::$variant(raster)
            }
        }
    };
}

impl_from_raster!(u8, U8);
impl_from_raster!(i8, I8);
impl_from_raster!(u16, U16);
impl_from_raster!(i16, I16);
impl_from_raster!(u32, U32);
impl_from_raster!(i32, I32);
impl_from_raster!(f32, F32);
impl_from_raster!(f64, F64);

impl DynRaster {
    pub fn georef(&self) -> &GeoReference {
        dispatch!(self, r => &r.georef)
    }

    pub fn nodata(&self) -> Option<f64> {
        dispatch!(self, r => r.nodata)
    }

    pub fn shape(&self) -> (usize, usize) {
        dispatch!(self, r => r.shape())
    }

    pub fn band_count(&self) -> usize {
        dispatch!(self, r => r.band_count())
    }

    pub fn sample_format(&self) -> (SampleFormat, u16) {
        fn format_of<T: Sample>(_: &Raster<T>) -> (SampleFormat, u16) {
            (T::FORMAT, T::BITS)
        }
        dispatch!(self, r => format_of(r))
    }

    /// Copy of one band converted to `U`.
    pub fn band_as<U: Sample>(&self, index: usize) -> Result<Array2<U>, RasterError> {
        dispatch!(self, r => Ok(r.band(index)?.mapv(|v| U::from_f64(v.to_f64()))))
    }
}

impl Display for DynRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        dispatch!(self, r => write!(f, "{r}"))
    }
}
