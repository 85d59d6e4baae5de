//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::process`] runs everything in one call. [`Pipeline`] instead
//! lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use sticker_pipeline::{Pipeline, PipelineError, StickerRequest};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let result = Pipeline::new(png, StickerRequest::default())
//!     .decode()?
//!     .remove_background()
//!     .bridge()
//!     .outline()
//!     .encode()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for the two fallible stages). Buffers move from stage to
//! stage; a stage either mutates what it received or allocates a new
//! buffer, and never keeps a reference to one it handed on.
//!
//! The type-erased [`Stage`] enum wraps the same structs so a caller can
//! loop over stages, which is how the background worker checks for
//! cancellation between steps.

use crate::closing::{bridge, radius_for_gap};
use crate::color::threshold_for;
use crate::diagnostics::StageMetrics;
use crate::mask::Mask;
use crate::types::{Dimensions, PipelineError, ProcessResult, RgbaImage, StickerRequest};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    request: StickerRequest,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty, [`PipelineError::UnsupportedFormat`] for formats other than
    /// PNG, JPEG and WebP, and [`PipelineError::ImageDecode`] if the data
    /// is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let original = crate::codec::decode(&self.source)?;
        log::debug!(
            "decoded {} bytes into {}x{}",
            self.source.len(),
            original.width(),
            original.height(),
        );
        Ok(Decoded {
            request: self.request.clamped(),
            dimensions: Dimensions::of(&original),
            original,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`remove_background`](Self::remove_background) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .remove_background() to continue"]
pub struct Decoded {
    request: StickerRequest,
    original: RgbaImage,
    dimensions: Dimensions,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGBA image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_count: self.dimensions.pixel_count(),
        }
    }

    /// Flood-fill the selected background to transparency.
    ///
    /// Without a selection the image passes through unchanged.
    pub fn remove_background(self) -> Cleaned {
        let threshold = threshold_for(self.request.parameters.tolerance);
        let mut cleaned = self.original;
        let removed = self.request.selection.map_or(0, |selection| {
            crate::flood_fill::remove_background(&mut cleaned, selection, threshold)
        });
        log::debug!(
            "removed {removed} background pixels (tolerance {}, threshold {threshold:.2})",
            self.request.parameters.tolerance,
        );
        Cleaned {
            request: self.request,
            cleaned,
            dimensions: self.dimensions,
            threshold,
            removed,
        }
    }
}

// ───────────────────────── Stage 2: Cleaned ──────────────────────────

/// Pipeline state after background removal.
///
/// Call [`bridge`](Self::bridge) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .bridge() to continue"]
pub struct Cleaned {
    request: StickerRequest,
    cleaned: RgbaImage,
    dimensions: Dimensions,
    threshold: f64,
    removed: usize,
}

impl Cleaned {
    /// The image with its background made transparent.
    #[must_use]
    pub const fn cleaned(&self) -> &RgbaImage {
        &self.cleaned
    }

    /// Number of pixels the flood fill removed.
    #[must_use]
    pub const fn removed(&self) -> usize {
        self.removed
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::BackgroundRemoval {
            seed: self.request.selection.map(|s| s.seed),
            tolerance: self.request.parameters.tolerance,
            threshold: self.threshold,
            removed_pixels: self.removed,
            total_pixels: self.dimensions.pixel_count(),
        }
    }

    /// Extract the silhouette and, when the merge gap is non-zero, bridge
    /// nearby fragments.
    pub fn bridge(self) -> Bridged {
        let silhouette = Mask::from_alpha(&self.cleaned);
        let gap = self.request.parameters.merge_gap_px;
        let bridged = (gap > 0).then(|| bridge(&silhouette, gap));
        Bridged {
            request: self.request,
            cleaned: self.cleaned,
            dimensions: self.dimensions,
            silhouette,
            bridged,
        }
    }
}

// ───────────────────────── Stage 3: Bridged ──────────────────────────

/// Pipeline state after gap bridging.
///
/// Call [`outline`](Self::outline) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .outline() to continue"]
pub struct Bridged {
    request: StickerRequest,
    cleaned: RgbaImage,
    dimensions: Dimensions,
    silhouette: Mask,
    bridged: Option<Mask>,
}

impl Bridged {
    /// The silhouette the outline will be built from: the bridged mask
    /// when bridging ran, otherwise the plain alpha silhouette.
    #[must_use]
    pub fn silhouette(&self) -> &Mask {
        self.bridged.as_ref().unwrap_or(&self.silhouette)
    }

    /// Whether bridging ran (merge gap > 0).
    #[must_use]
    pub const fn is_bridged(&self) -> bool {
        self.bridged.is_some()
    }

    /// Paint the white outline ring and composite the cleaned image on
    /// top.
    pub fn outline(self) -> Outlined {
        let thickness = self.request.parameters.thickness_px;
        let (sticker, ring_pixels) = crate::outline::compose(
            &self.cleaned,
            self.silhouette(),
            thickness,
            self.is_bridged(),
        );
        log::debug!(
            "outlined at {thickness}px: {}x{} sticker, {ring_pixels} ring pixels",
            sticker.width(),
            sticker.height(),
        );
        Outlined {
            request: self.request,
            sticker,
            dimensions: self.dimensions,
            ring_pixels,
        }
    }
}

// ───────────────────────── Stage 4: Outlined ─────────────────────────

/// Pipeline state after outline compositing.
///
/// Call [`encode`](Self::encode) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .encode() to continue"]
pub struct Outlined {
    request: StickerRequest,
    sticker: RgbaImage,
    dimensions: Dimensions,
    ring_pixels: u64,
}

impl Outlined {
    /// The finished sticker raster.
    #[must_use]
    pub const fn sticker(&self) -> &RgbaImage {
        &self.sticker
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Outline {
            thickness: self.request.parameters.thickness_px,
            width: self.sticker.width(),
            height: self.sticker.height(),
            ring_pixels: self.ring_pixels,
        }
    }

    /// Encode the sticker as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if PNG encoding fails.
    pub fn encode(self) -> Result<Encoded, PipelineError> {
        let png = crate::codec::encode_png(&self.sticker)?;
        log::debug!("encoded sticker as {} PNG bytes", png.len());
        Ok(Encoded {
            request: self.request,
            sticker: self.sticker,
            dimensions: self.dimensions,
            png,
        })
    }
}

// ───────────────────────── Stage 5: Encoded ──────────────────────────

/// Final pipeline state: the sticker and its PNG encoding.
#[must_use = "call .into_result() to take the finished sticker"]
pub struct Encoded {
    request: StickerRequest,
    sticker: RgbaImage,
    dimensions: Dimensions,
    png: Vec<u8>,
}

impl Encoded {
    /// The PNG bytes.
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// The request this run was configured with.
    #[must_use]
    pub const fn request(&self) -> &StickerRequest {
        &self.request
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Encode {
            png_bytes: self.png.len(),
        }
    }

    /// Consume the pipeline and return the finished result.
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            image: self.sticker,
            png: self.png,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded RGBA image.
    Decoded {
        /// The original image.
        original: &'a RgbaImage,
    },
    /// Image with the background removed.
    Cleaned {
        /// The cleaned image.
        cleaned: &'a RgbaImage,
    },
    /// Silhouette after bridging.
    Bridged {
        /// The silhouette the outline is built from.
        silhouette: &'a Mask,
    },
    /// Composited sticker.
    Outlined {
        /// The sticker raster.
        sticker: &'a RgbaImage,
    },
    /// Encoded sticker.
    Encoded {
        /// PNG bytes.
        png: &'a [u8],
        /// Source image dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"bridge"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Encoded).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Pending`], which has done no work, and for
    /// [`Bridged`] when the merge gap was zero.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns the decode errors of [`Pending::decode`] and
    /// [`PipelineError::ImageEncode`] from [`Outlined::encode`].
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion and return the final
    /// [`ProcessResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<ProcessResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Cleaned(self.remove_background())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.remove_background().complete()
    }
}

impl PipelineStage for Cleaned {
    const NAME: &str = "remove_background";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Cleaned {
            cleaned: &self.cleaned,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Bridged(self.bridge())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.bridge().complete()
    }
}

impl PipelineStage for Bridged {
    const NAME: &str = "bridge";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Bridged {
            silhouette: self.silhouette(),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let bridged = self.bridged.as_ref()?;
        let gap = self.request.parameters.merge_gap_px;
        Some(StageMetrics::Bridging {
            gap,
            radius: radius_for_gap(gap),
            fragments_before: self.silhouette.fragments(),
            fragments_after: bridged.fragments(),
            added_pixels: bridged.count().saturating_sub(self.silhouette.count()),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Outlined(self.outline())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.outline().complete()
    }
}

impl PipelineStage for Outlined {
    const NAME: &str = "outline";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Outlined {
            sticker: &self.sticker,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Encoded(self.encode()?)))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.encode()?.complete()
    }
}

impl PipelineStage for Encoded {
    const NAME: &str = "encode";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Encoded {
            png: &self.png,
            dimensions: self.dimensions,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use sticker_pipeline::{Pipeline, PipelineError, StickerRequest};
/// # use sticker_pipeline::pipeline::{Stage, Advance};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(png, StickerRequest::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Cleaned`].
    Cleaned(Cleaned),
    /// See [`Bridged`].
    Bridged(Bridged),
    /// See [`Outlined`].
    Outlined(Outlined),
    /// See [`Encoded`].
    Encoded(Encoded),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Cleaned(_)
        | Stage::Bridged(_)
        | Stage::Outlined(_)
        | Stage::Encoded(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Cleaned(s) => s.$method($($arg),*),
            Self::Bridged(s) => s.$method($($arg),*),
            Self::Outlined(s) => s.$method($($arg),*),
            Self::Encoded(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Encoded(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-final stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<ProcessResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Associated constants are not callable through `self`, so the macro
// goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for Stage {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Cleaned> for Stage {
    fn from(s: Cleaned) -> Self {
        Self::Cleaned(s)
    }
}

impl From<Bridged> for Stage {
    fn from(s: Bridged) -> Self {
        Self::Bridged(s)
    }
}

impl From<Outlined> for Stage {
    fn from(s: Outlined) -> Self {
        Self::Outlined(s)
    }
}

impl From<Encoded> for Stage {
    fn from(s: Encoded) -> Self {
        Self::Encoded(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental sticker pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Start from encoded image bytes. Nothing is processed yet.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, request: StickerRequest) -> Pending {
        Pending {
            request,
            source: image_bytes,
        }
    }

    /// Start from an already-decoded image, skipping the decode stage.
    ///
    /// The decode metrics of such a run report zero input bytes.
    pub fn from_image(image: RgbaImage, request: StickerRequest) -> Decoded {
        Decoded {
            request: request.clamped(),
            dimensions: Dimensions::of(&image),
            original: image,
            source_len: 0,
        }
    }
}
