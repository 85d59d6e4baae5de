//! Shared types for the sticker pipeline.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Re-export `GrayImage` so downstream crates can reference mask
/// rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage`, the pixel buffer every stage operates on.
pub use image::RgbaImage;

/// A pixel coordinate in the source image (where the user clicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed {
    /// Column, counted from the left edge.
    pub x: u32,
    /// Row, counted from the top edge.
    pub y: u32,
}

impl Seed {
    /// Create a new seed.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A background selection: the clicked pixel and the color to remove.
///
/// The color is normally the one sampled under the seed, but the two are
/// kept separate so a caller can override the target color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Where the flood fill starts.
    pub seed: Seed,
    /// The fixed color every candidate pixel is compared against.
    pub color: Color,
}

impl Selection {
    /// Select the color under `seed`.
    ///
    /// Returns `None` for transparent or out-of-range pixels, which
    /// leaves any previous selection in place.
    #[must_use]
    pub fn pick(image: &RgbaImage, seed: Seed) -> Option<Self> {
        crate::color::pick_color(image, seed.x, seed.y).map(|color| Self { seed, color })
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// User-adjustable processing parameters.
///
/// Fields are independent: changing any one of them re-runs the whole
/// pipeline. Values outside the documented ranges are not rejected; a
/// pipeline run [`clamps`](Self::clamped) them when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Background tolerance, 0–100 (percent of the maximum color distance).
    pub tolerance: u8,

    /// Outline thickness in pixels, 0–50.
    pub thickness_px: u32,

    /// Largest gap between fragments that gets bridged, 0–150 pixels.
    pub merge_gap_px: u32,
}

impl Parameters {
    /// Default tolerance.
    pub const DEFAULT_TOLERANCE: u8 = 15;
    /// Default outline thickness.
    pub const DEFAULT_THICKNESS_PX: u32 = 15;
    /// Default merge gap (bridging disabled).
    pub const DEFAULT_MERGE_GAP_PX: u32 = 0;

    /// Upper bound of the tolerance slider.
    pub const MAX_TOLERANCE: u8 = 100;
    /// Upper bound of the thickness slider.
    pub const MAX_THICKNESS_PX: u32 = 50;
    /// Upper bound of the merge gap slider.
    pub const MAX_MERGE_GAP_PX: u32 = 150;

    /// Copy with every field clamped to its documented range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            tolerance: self.tolerance.min(Self::MAX_TOLERANCE),
            thickness_px: self.thickness_px.min(Self::MAX_THICKNESS_PX),
            merge_gap_px: self.merge_gap_px.min(Self::MAX_MERGE_GAP_PX),
        }
    }

    /// Restore tolerance and thickness to their defaults.
    ///
    /// The merge gap is deliberately left untouched.
    #[must_use]
    pub const fn reset(self) -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            thickness_px: Self::DEFAULT_THICKNESS_PX,
            merge_gap_px: self.merge_gap_px,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            thickness_px: Self::DEFAULT_THICKNESS_PX,
            merge_gap_px: Self::DEFAULT_MERGE_GAP_PX,
        }
    }
}

/// Everything a single pipeline run depends on besides the source image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerRequest {
    /// Background to remove; `None` keeps the image as decoded.
    pub selection: Option<Selection>,
    /// Slider values.
    pub parameters: Parameters,
}

impl StickerRequest {
    /// Copy with the parameters clamped to their documented ranges.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            parameters: self.parameters.clamped(),
            ..self
        }
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Final sticker raster, `(w + 2t) × (h + 2t)` for thickness `t`.
    pub image: RgbaImage,
    /// PNG encoding of [`image`](Self::image).
    pub png: Vec<u8>,
    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,
}

impl ProcessResult {
    /// Dimensions of the final sticker.
    #[must_use]
    pub fn output_dimensions(&self) -> Dimensions {
        Dimensions::of(&self.image)
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only the decode and encode boundaries can fail; the raster stages in
/// between operate on well-formed buffers.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The payload is a recognised image type that is not accepted.
    #[error("unsupported image format: {0} (expected PNG, JPEG or WebP)")]
    UnsupportedFormat(String),

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to serialize the final sticker.
    #[error("failed to encode sticker: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The run was superseded by a newer one before it finished.
    #[error("run was superseded by a newer request")]
    Cancelled,
}
