use crate::acquire::AcquireError;
use crate::clip::ClipError;
use crate::config::ConfigError;
use crate::geotags::GeoTiffError;
use crate::raster::RasterError;
use crate::stats::StatsError;
use crate::tiff::TiffError;
use crate::tiles::TileError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaterlineError {
    #[error(transparent)]
    Tiff(#[from] TiffError),

    #[error(transparent)]
    GeoTiff(#[from] GeoTiffError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Clip(#[from] ClipError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[cfg(feature = "image")]
    #[error(transparent)]
    Quicklook(#[from] crate::quicklook::QuicklookError),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Tiles(#[from] TileError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Bad file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("{}: {source}", path.display())]
    ClipFile {
        path: PathBuf,
        #[source]
        source: ClipError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WaterlineResult<T> = Result<T, WaterlineError>;
