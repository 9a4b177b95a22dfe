use super::TagId;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TiffError {
    #[error("not a TIFF file: bad magic bytes")]
    BadMagicBytes,

    #[error("TIFF has no image file directory")]
    NoIfd,

    #[error("missing tag {0:?}")]
    MissingTag(TagId),

    #[error("malformed tag {0:?}")]
    BadTag(TagId),

    #[error("offset {0} does not fit in a classic TIFF, use BigTIFF")]
    OffsetOverflow(u64),

    #[error("TIFF I/O error: {0}")]
    ReadError(#[from] io::Error),
}
