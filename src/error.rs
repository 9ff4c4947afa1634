//! Error types for rivermap

use thiserror::Error;

/// Everything that can stop the pipeline before a raster is produced.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input shape {width}x{height}: {reason}")]
    InvalidInputShape {
        width: usize,
        height: usize,
        reason: String,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot encode a {0}-bit greyscale raster (use a .tif output)")]
    UnsupportedOutputDepth(u32),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rivermap operations
pub type Result<T> = std::result::Result<T, Error>;
