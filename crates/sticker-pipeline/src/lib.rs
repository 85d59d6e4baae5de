//! sticker-pipeline: Pure raster pipeline that turns a photo into a
//! die-cut sticker (sans-IO).
//!
//! Takes an uploaded image and produces a PNG through:
//! decode -> background removal -> fragment bridging -> outline -> encode.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and pixel buffers. Threads, files, and the command line
//! live in `sticker-worker` and `sticker`.

pub mod closing;
pub mod codec;
pub mod color;
pub mod diagnostics;
pub mod dilate;
pub mod flood_fill;
pub mod mask;
pub mod outline;
pub mod pipeline;
pub mod session;
pub mod types;

pub use color::Color;
pub use diagnostics::{Clock, PipelineDiagnostics, StageMetrics, process_with_diagnostics};
pub use mask::Mask;
pub use pipeline::Pipeline;
pub use session::{Phase, Publication, RunRequest, Session, SessionState};
pub use types::{
    Dimensions, Parameters, PipelineError, ProcessResult, RgbaImage, Seed, Selection,
    StickerRequest,
};

/// Run the full pipeline on encoded image bytes and return the PNG.
///
/// # Pipeline steps
///
/// 1. Decode (PNG, JPEG or WebP) to RGBA
/// 2. Flood-fill the selected background to transparency
/// 3. Bridge nearby fragments (when the merge gap is non-zero)
/// 4. Paint the outline ring and composite the image on top
/// 5. Encode as PNG
///
/// Without a `selection` step 2 is skipped and the decoded image is
/// outlined as-is.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::UnsupportedFormat`] or [`PipelineError::ImageDecode`]
/// if it cannot be decoded, and [`PipelineError::ImageEncode`] if the
/// sticker cannot be encoded.
pub fn process(
    image_bytes: &[u8],
    selection: Option<Selection>,
    parameters: &Parameters,
) -> Result<Vec<u8>, PipelineError> {
    let source = codec::decode(image_bytes)?;
    let request = StickerRequest {
        selection,
        parameters: *parameters,
    };
    Ok(process_image(&source, &request)?.png)
}

/// Run every stage after decoding on an already-decoded image.
///
/// The source is left untouched; the pipeline works on a copy.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the sticker cannot be
/// encoded (for example a zero-sized source).
pub fn process_image(
    source: &RgbaImage,
    request: &StickerRequest,
) -> Result<ProcessResult, PipelineError> {
    Pipeline::from_image(source.clone(), *request)
        .remove_background()
        .bridge()
        .outline()
        .encode()
        .map(pipeline::Encoded::into_result)
}
