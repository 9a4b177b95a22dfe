use crate::tiff::TagId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoTiffError {
    #[error("missing GeoTIFF tag {0:?}")]
    MissingTag(TagId),

    #[error("malformed GeoTIFF tag {0:?}")]
    BadTag(TagId),

    #[error("degenerate geotransform: {0:?}")]
    InvalidTransform([f64; 6]),
}
