//! Error types for the shadowmark crate.

/// Errors that can occur while embedding or extracting a watermark.
///
/// A wrong password is deliberately absent: extraction with the wrong password
/// succeeds structurally and yields unrelated text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The text cannot be turned into a payload (empty, or outside the
    /// selected character encoding).
    #[error("cannot encode text: {0}")]
    Encoding(String),

    /// A bit count that is not a whole, non-zero number of bytes.
    #[error("bit length {bits} is not a non-zero multiple of 8")]
    LengthMismatch {
        /// The offending bit count.
        bits: usize,
    },

    /// The payload needs more blocks than the image provides.
    #[error("payload needs {needed} blocks but the image only has {available}")]
    Capacity {
        /// Blocks required by the payload (one per bit).
        needed: usize,
        /// Whole 8x8 blocks available in the image.
        available: usize,
    },

    /// The pixel grid has a layout the codec cannot work with.
    #[error("unsupported pixel grid: {0}")]
    ImageFormat(String),

    /// A block refused to hold its bit after every refinement pass.
    #[error("block {block} cannot retain an embedded bit")]
    Unembeddable {
        /// Raster index of the block.
        block: usize,
    },

    /// A codec option is outside its valid range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file format cannot be used (unknown, or lossy on output).
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while decoding or encoding an image file.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("jpeg".to_string());
        assert!(unsupported.to_string().contains("jpeg"));

        let capacity = Error::Capacity {
            needed: 2048,
            available: 1024,
        };
        let msg = capacity.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));

        let mismatch = Error::LengthMismatch { bits: 39 };
        assert!(mismatch.to_string().contains("39"));
    }
}
