//! Decoding uploads and encoding finished stickers.
//!
//! These are the only fallible steps of a run: everything between them
//! works on well-formed in-memory buffers.

use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use crate::types::{PipelineError, RgbaImage};

/// Upload formats the decoder accepts.
pub const ACCEPTED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Decode raw upload bytes into an RGBA buffer.
///
/// The format is sniffed from the payload's magic bytes; anything other
/// than PNG, JPEG or WebP is rejected.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty,
/// [`PipelineError::UnsupportedFormat`] for a recognised but rejected
/// format, and [`PipelineError::ImageDecode`] if the format is unknown
/// or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let format = image::guess_format(bytes)?;
    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(PipelineError::UnsupportedFormat(format!("{format:?}")));
    }

    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(image.to_rgba8())
}

/// Encode an RGBA buffer as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder rejects the
/// buffer (for example a zero-sized image).
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(PipelineError::ImageEncode)?;
    Ok(buf)
}
