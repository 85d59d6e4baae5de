//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! The crate stays clock-agnostic: callers supply a [`Clock`] so the same
//! code can be timed with `std::time::Instant` in the CLI and with a fake
//! clock in tests.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineError, ProcessResult, Seed, StickerRequest};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
///
/// Bridging is skipped when the merge gap is zero, so its entry is
/// optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: background flood fill.
    pub background_removal: StageDiagnostics,
    /// Stage 3: gap bridging (only when `merge_gap_px > 0`).
    pub bridging: Option<StageDiagnostics>,
    /// Stage 4: outline compositing.
    pub outline: StageDiagnostics,
    /// Stage 5: PNG encoding.
    pub encode: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes (zero when started from pixels).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Background flood-fill metrics.
    BackgroundRemoval {
        /// Seed position, if a selection was made.
        seed: Option<Seed>,
        /// Tolerance slider value.
        tolerance: u8,
        /// Absolute color-distance threshold derived from the tolerance.
        threshold: f64,
        /// Pixels whose alpha was zeroed.
        removed_pixels: usize,
        /// Total pixel count of the source image.
        total_pixels: u64,
    },
    /// Gap bridging metrics.
    Bridging {
        /// Merge gap in pixels.
        gap: u32,
        /// Radius of the closing disk.
        radius: u32,
        /// 4-connected fragments before bridging.
        fragments_before: u32,
        /// 4-connected fragments after bridging.
        fragments_after: u32,
        /// Pixels added by the bridge.
        added_pixels: u64,
    },
    /// Outline compositing metrics.
    Outline {
        /// Outline thickness in pixels.
        thickness: u32,
        /// Sticker width in pixels.
        width: u32,
        /// Sticker height in pixels.
        height: u32,
        /// White pixels not covered by the foreground.
        ring_pixels: u64,
    },
    /// PNG encoding metrics.
    Encode {
        /// Size of the encoded PNG.
        png_bytes: usize,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Sticker width in pixels.
    pub output_width: u32,
    /// Sticker height in pixels.
    pub output_height: u32,
    /// Size of the encoded PNG.
    pub png_bytes: usize,
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// Produces the same [`ProcessResult`] as [`crate::process_image`] plus
/// per-stage diagnostics.
///
/// # Errors
///
/// Returns the decode and encode errors of the pipeline stages.
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    request: &StickerRequest,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let run_start = clock.now();

    let start = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), *request).decode()?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: decoded.stage_metrics(),
    };

    let start = clock.now();
    let cleaned = decoded.remove_background();
    let background_removal = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: cleaned.stage_metrics(),
    };

    let start = clock.now();
    let bridged = cleaned.bridge();
    let bridge_duration = clock.elapsed(&start);
    let bridging = bridged.metrics().map(|metrics| StageDiagnostics {
        duration: bridge_duration,
        metrics,
    });

    let start = clock.now();
    let outlined = bridged.outline();
    let outline = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: outlined.stage_metrics(),
    };

    let start = clock.now();
    let encoded = outlined.encode()?;
    let encode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: encoded.stage_metrics(),
    };

    let total_duration = clock.elapsed(&run_start);
    let result = encoded.into_result();
    let output = result.output_dimensions();
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        output_width: output.width,
        output_height: output.height,
        png_bytes: result.png.len(),
    };

    Ok((
        result,
        PipelineDiagnostics {
            decode,
            background_removal,
            bridging,
            outline,
            encode,
            total_duration,
            summary,
        },
    ))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Sticker Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> sticker {}x{} ({} PNG bytes)",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.output_width,
            self.summary.output_height,
            self.summary.png_bytes,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<20} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages = vec![
            ("Decode", &self.decode),
            ("Remove Background", &self.background_removal),
        ];
        if let Some(ref b) = self.bridging {
            stages.push(("Bridge", b));
        }
        stages.push(("Outline", &self.outline));
        stages.push(("Encode", &self.encode));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<20} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::BackgroundRemoval {
            seed,
            tolerance,
            threshold,
            removed_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let share = if *total_pixels > 0 {
                *removed_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let seed = seed.map_or_else(|| "none".to_owned(), |s| format!("({}, {})", s.x, s.y));
            format!(
                "seed={seed} tol={tolerance} (d<={threshold:.1}) removed={removed_pixels} ({share:.1}%)",
            )
        }
        StageMetrics::Bridging {
            gap,
            radius,
            fragments_before,
            fragments_after,
            added_pixels,
        } => format!(
            "gap={gap} r={radius} fragments={fragments_before}->{fragments_after} added={added_pixels}",
        ),
        StageMetrics::Outline {
            thickness,
            width,
            height,
            ring_pixels,
        } => format!("t={thickness} {width}x{height} ring={ring_pixels}"),
        StageMetrics::Encode { png_bytes } => format!("{png_bytes} bytes"),
    }
}
