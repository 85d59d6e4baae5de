//! Interactive session: source image, selection, sliders, and the latest
//! published sticker.
//!
//! Every change that needs a recompute hands back a [`RunRequest`] tagged
//! with a fresh generation number. Whoever executes the request (inline
//! or on a worker thread) reports back through [`Session::publish`],
//! which applies only the newest generation so a slow, superseded run can
//! never overwrite a fresher result.
//!
//! ```text
//!          upload ok                 publish(latest, Ok)
//!   Idle ───────────▶ Running ──────────────────────────▶ Ready
//!    ▲  ╲ upload                ▲                           │
//!    │   ╲ fails                │  pick / slider / reset    │
//!    │    ▼                     └───────────────────────────┘
//!    └── Loading
//! ```

use std::sync::Arc;

use crate::types::{
    Parameters, PipelineError, ProcessResult, RgbaImage, Seed, Selection, StickerRequest,
};

/// Where the session is in its load/compute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Decoding an upload.
    Loading,
    /// A run has been requested and not yet published.
    Running,
    /// The latest run's result is available.
    Ready,
}

/// Snapshot of everything the user can see or change.
///
/// The session replaces this record wholesale on every transition.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Load/compute phase.
    pub phase: Phase,
    /// The decoded upload.
    pub source: Option<Arc<RgbaImage>>,
    /// Background selection, cleared on upload and reset.
    pub selection: Option<Selection>,
    /// Slider values.
    pub parameters: Parameters,
    /// The most recently published sticker.
    pub result: Option<Arc<ProcessResult>>,
    /// Message of the last failure, cleared by the next success.
    pub last_error: Option<String>,
}

/// A pipeline run to execute on behalf of the session.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Generation this run belongs to.
    pub generation: u64,
    /// Source image shared with the session.
    pub source: Arc<RgbaImage>,
    /// Selection and parameters captured when the run was requested.
    pub request: StickerRequest,
}

impl RunRequest {
    /// Execute the request on the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if the sticker cannot be
    /// encoded.
    pub fn run(&self) -> Result<ProcessResult, PipelineError> {
        crate::process_image(&self.source, &self.request)
    }
}

/// What [`Session::publish`] did with an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    /// The result became the session's current sticker.
    Applied,
    /// The outcome belonged to a superseded generation and was dropped.
    Stale,
    /// The latest run failed; the previous sticker (if any) was kept.
    Failed(String),
}

/// The session state machine.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    generation: u64,
}

impl Session {
    /// A fresh, idle session with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state snapshot.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Generation of the most recently requested run.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Decode a new upload and request a run for it.
    ///
    /// On success the selection and previous result are cleared;
    /// parameters carry over. On failure the session returns to
    /// [`Phase::Idle`] with the error recorded and everything else
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns the decode error ([`PipelineError::EmptyInput`],
    /// [`PipelineError::UnsupportedFormat`] or
    /// [`PipelineError::ImageDecode`]).
    pub fn upload(&mut self, bytes: &[u8]) -> Result<RunRequest, PipelineError> {
        self.replace(SessionState {
            phase: Phase::Loading,
            ..self.state.clone()
        });

        match crate::codec::decode(bytes) {
            Ok(image) => {
                log::debug!("upload decoded to {}x{}", image.width(), image.height());
                let source = Arc::new(image);
                Ok(self.request_run(Arc::clone(&source), SessionState {
                    phase: Phase::Running,
                    source: Some(source),
                    selection: None,
                    parameters: self.state.parameters,
                    result: None,
                    last_error: None,
                }))
            }
            Err(e) => {
                log::debug!("upload rejected: {e}");
                self.replace(SessionState {
                    phase: Phase::Idle,
                    last_error: Some(e.to_string()),
                    ..self.state.clone()
                });
                Err(e)
            }
        }
    }

    /// Select the background under source pixel `(x, y)`.
    ///
    /// Clicking a transparent pixel, or outside the image, is ignored and
    /// keeps the previous selection; `None` is returned in that case and
    /// when no image is loaded.
    pub fn pick(&mut self, x: u32, y: u32) -> Option<RunRequest> {
        let source = Arc::clone(self.state.source.as_ref()?);
        let selection = Selection::pick(&source, Seed::new(x, y))?;
        Some(self.request_run(source, SessionState {
            selection: Some(selection),
            ..self.running()
        }))
    }

    /// Use `selection` as-is, including a target color that may differ
    /// from the pixel under the seed.
    ///
    /// Returns `None` when no image is loaded or the seed lies outside
    /// it.
    pub fn select(&mut self, selection: Selection) -> Option<RunRequest> {
        let source = Arc::clone(self.state.source.as_ref()?);
        let Seed { x, y } = selection.seed;
        if x >= source.width() || y >= source.height() {
            return None;
        }
        Some(self.request_run(source, SessionState {
            selection: Some(selection),
            ..self.running()
        }))
    }

    /// Set the tolerance (clamped to 0–100).
    pub fn set_tolerance(&mut self, tolerance: u8) -> Option<RunRequest> {
        self.set_parameters(Parameters {
            tolerance,
            ..self.state.parameters
        })
    }

    /// Set the outline thickness (clamped to 0–50).
    pub fn set_thickness(&mut self, thickness_px: u32) -> Option<RunRequest> {
        self.set_parameters(Parameters {
            thickness_px,
            ..self.state.parameters
        })
    }

    /// Set the merge gap (clamped to 0–150).
    pub fn set_merge_gap(&mut self, merge_gap_px: u32) -> Option<RunRequest> {
        self.set_parameters(Parameters {
            merge_gap_px,
            ..self.state.parameters
        })
    }

    /// Clear the selection and restore tolerance and thickness to their
    /// defaults. The merge gap is kept.
    ///
    /// Returns a run request when an image is loaded.
    pub fn reset(&mut self) -> Option<RunRequest> {
        let next = SessionState {
            selection: None,
            parameters: self.state.parameters.reset(),
            result: None,
            ..self.state.clone()
        };
        let Some(source) = next.source.clone() else {
            self.replace(next);
            return None;
        };
        Some(self.request_run(source, SessionState {
            phase: Phase::Running,
            ..next
        }))
    }

    /// Report the outcome of the run tagged `generation`.
    ///
    /// Outcomes of older generations are discarded. A failure or
    /// cancellation of the latest run keeps the previous sticker: the
    /// session goes back to [`Phase::Ready`] if it has one and to
    /// [`Phase::Idle`] otherwise.
    pub fn publish(
        &mut self,
        generation: u64,
        outcome: Result<ProcessResult, PipelineError>,
    ) -> Publication {
        if generation != self.generation {
            log::debug!(
                "discarding result of generation {generation} (latest is {})",
                self.generation
            );
            return Publication::Stale;
        }

        match outcome {
            Ok(result) => {
                self.replace(SessionState {
                    phase: Phase::Ready,
                    result: Some(Arc::new(result)),
                    last_error: None,
                    ..self.state.clone()
                });
                Publication::Applied
            }
            Err(PipelineError::Cancelled) => {
                // Nothing newer is coming, so leave Running.
                self.replace(SessionState {
                    phase: self.settled_phase(),
                    ..self.state.clone()
                });
                Publication::Stale
            }
            Err(e) => {
                let message = e.to_string();
                log::debug!("generation {generation} failed: {message}");
                self.replace(SessionState {
                    phase: self.settled_phase(),
                    last_error: Some(message.clone()),
                    ..self.state.clone()
                });
                Publication::Failed(message)
            }
        }
    }

    /// Where the session rests once the latest run produced nothing new.
    const fn settled_phase(&self) -> Phase {
        if self.state.result.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    fn set_parameters(&mut self, parameters: Parameters) -> Option<RunRequest> {
        let parameters = parameters.clamped();
        let Some(source) = self.state.source.clone() else {
            self.replace(SessionState {
                parameters,
                ..self.state.clone()
            });
            return None;
        };
        Some(self.request_run(source, SessionState {
            parameters,
            ..self.running()
        }))
    }

    /// A copy of the current state marked as running.
    fn running(&self) -> SessionState {
        SessionState {
            phase: Phase::Running,
            ..self.state.clone()
        }
    }

    /// Install `next`, bump the generation, and describe the run it needs.
    fn request_run(&mut self, source: Arc<RgbaImage>, next: SessionState) -> RunRequest {
        self.generation += 1;
        self.replace(next);
        log::debug!("requesting run for generation {}", self.generation);
        RunRequest {
            generation: self.generation,
            source,
            request: StickerRequest {
                selection: self.state.selection,
                parameters: self.state.parameters,
            },
        }
    }

    fn replace(&mut self, next: SessionState) {
        if next.phase != self.state.phase {
            log::trace!("session phase {:?} -> {:?}", self.state.phase, next.phase);
        }
        self.state = next;
    }
}
