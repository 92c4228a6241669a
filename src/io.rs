//! Image file loading and saving around the codec.
//!
//! The codec works on in-memory pixel grids. This module reads carrier and
//! stego files and refuses to write stego images in lossy formats: JPEG
//! re-encoding moves samples far enough to destroy the watermark.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::codec::{CodecOptions, WatermarkCodec};
use crate::error::{Error, Result};
use crate::schedule::Password;

/// Check if a file has an extension [`load_image`] accepts.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

/// Whether images saved in `format` keep every 8-bit sample exactly.
#[must_use]
pub fn is_lossless(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::WebP | ImageFormat::Tiff
    )
}

/// The lossless format `path` names, or an error.
fn output_format(path: &Path) -> Result<ImageFormat> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    if !is_lossless(format) {
        return Err(Error::UnsupportedFormat(format!(
            "{format:?} is lossy and would destroy the watermark; use PNG"
        )));
    }
    Ok(format)
}

/// Load an image file as a pixel grid.
///
/// Samples wider than 8 bits are narrowed to 8-bit grey or RGB, keeping any
/// alpha channel, so the grid can carry a watermark.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if the extension is not one of
/// [`is_supported_image`], checked before the file is opened, and
/// [`Error::Image`] if the file cannot be read or decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !is_supported_image(path) {
        return Err(Error::UnsupportedFormat(format!(
            "{} is not a supported image file",
            path.display()
        )));
    }

    let img = image::open(path)?;
    if matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
    ) {
        return Ok(img);
    }

    let color = img.color();
    log::debug!("Converting {color:?} samples to 8 bits");
    Ok(match (color.has_color(), color.has_alpha()) {
        (false, false) => DynamicImage::ImageLuma8(img.to_luma8()),
        (false, true) => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        (true, false) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (true, true) => DynamicImage::ImageRgba8(img.to_rgba8()),
    })
}

/// Save a stego image in a lossless format chosen by the file extension.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown or lossy formats, and
/// [`Error::Image`] or [`Error::Io`] if writing fails.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format = output_format(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    img.save_with_format(path, format)?;
    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_marked.png"`. The output is always
/// PNG so a JPEG carrier still yields a usable stego image.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_marked.png"))
}

/// Load `input`, hide `text` in it, and save the result to `output`.
///
/// Returns the payload bit length, which the caller must keep for
/// extraction.
///
/// # Errors
///
/// Any error from [`WatermarkCodec::new`], [`load_image`],
/// [`WatermarkCodec::embed`] or [`save_image`]. Nothing is written on
/// failure.
pub fn embed_file(
    input: &Path,
    output: &Path,
    text: &str,
    password: Password,
    options: &CodecOptions,
) -> Result<usize> {
    let codec = WatermarkCodec::new(*options)?;

    // Check the output format before doing any work.
    output_format(output)?;

    log::debug!("Loading carrier image @ {}", input.display());
    let carrier = load_image(input)?;
    log::debug!(
        "Carrier is {}x{} {:?}, capacity {} bits",
        carrier.width(),
        carrier.height(),
        carrier.color(),
        codec.capacity(&carrier)?
    );

    let embedded = codec.embed(&carrier, text, password)?;
    log::debug!("Embedded {} bits", embedded.bit_length);

    save_image(&embedded.image, output)?;
    log::info!(
        "Wrote {} ({} bits, keep this number for extraction)",
        output.display(),
        embedded.bit_length
    );

    Ok(embedded.bit_length)
}

/// Load a stego image and recover `bit_length` bits of text from it.
///
/// # Errors
///
/// Any error from [`WatermarkCodec::new`], [`load_image`] or
/// [`WatermarkCodec::extract`].
pub fn extract_file(
    input: &Path,
    bit_length: usize,
    password: Password,
    options: &CodecOptions,
) -> Result<String> {
    let codec = WatermarkCodec::new(*options)?;

    log::debug!("Loading stego image @ {}", input.display());
    let stego = load_image(input)?;
    if matches!(ImageFormat::from_path(input), Ok(f) if !is_lossless(f)) {
        log::warn!(
            "{} is stored in a lossy format; the watermark is probably damaged",
            input.display()
        );
    }

    let text = codec.extract(&stego, bit_length, password)?;
    log::debug!("Extracted {} bytes", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_appends_marked_suffix() {
        let p = default_output_path(Path::new("/tmp/photo.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/photo_marked.png"));

        let p = default_output_path(Path::new("image.png"));
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "image_marked.png"
        );
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
        assert!(is_supported_image(Path::new("photo.tiff")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn load_rejects_unsupported_extension_before_reading() {
        let err = load_image(Path::new("does_not_exist.gif")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let err = load_image(Path::new("does_not_exist.png")).unwrap_err();
        assert!(matches!(err, Error::Image(_) | Error::Io(_)));
    }

    #[test]
    fn jpeg_is_not_lossless() {
        assert!(!is_lossless(ImageFormat::Jpeg));
        assert!(is_lossless(ImageFormat::Png));
    }

    #[test]
    fn save_refuses_jpeg() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(8, 8));
        let err = save_image(&img, Path::new("never_written.jpg")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!Path::new("never_written.jpg").exists());
    }
}
