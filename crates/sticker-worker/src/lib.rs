//! Background worker for sticker pipeline runs.
//!
//! [`StickerWorker`] owns a dedicated thread that executes
//! [`RunRequest`]s produced by a [`Session`]. Every request carries the
//! session generation it was made for; the worker remembers the newest
//! generation it has been handed and abandons older runs between pipeline
//! stages, reporting them as [`PipelineError::Cancelled`].
//!
//! Results come back as [`Completion`]s, tagged with their generation so
//! [`Session::publish`] can drop anything that is no longer current.
//!
//! Running the pipeline here keeps the caller's thread free for input
//! handling while a large image is processed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use sticker_pipeline::pipeline::{Advance, Stage};
use sticker_pipeline::{
    Pipeline, PipelineError, ProcessResult, Publication, RunRequest, Session,
};

/// Errors from talking to the worker thread.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The operating system refused to start the thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread is gone (it panicked or was shut down).
    #[error("worker thread has stopped")]
    Disconnected,

    /// No completion arrived within the requested time.
    #[error("timed out after {0:?} waiting for the worker")]
    Timeout(Duration),
}

/// The outcome of one executed (or abandoned) request.
#[derive(Debug)]
pub struct Completion {
    /// Generation of the request this answers.
    pub generation: u64,
    /// The sticker, or why there is none.
    pub outcome: Result<ProcessResult, PipelineError>,
}

impl Completion {
    /// Hand the outcome to `session`, which applies it only if it is
    /// still the latest generation.
    pub fn publish_to(self, session: &mut Session) -> Publication {
        session.publish(self.generation, self.outcome)
    }
}

/// A pipeline runner on its own thread.
///
/// Dropping the worker cancels any in-flight run and joins the thread.
pub struct StickerWorker {
    requests: Option<mpsc::Sender<RunRequest>>,
    completions: mpsc::Receiver<Completion>,
    latest: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl StickerWorker {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if the thread cannot be created.
    pub fn spawn() -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::channel::<RunRequest>();
        let (completion_tx, completion_rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));

        let thread_latest = Arc::clone(&latest);
        let handle = std::thread::Builder::new()
            .name("sticker-worker".into())
            .spawn(move || serve(&request_rx, &completion_tx, &thread_latest))
            .map_err(WorkerError::Spawn)?;
        log::trace!("sticker worker started");

        Ok(Self {
            requests: Some(request_tx),
            completions: completion_rx,
            latest,
            handle: Some(handle),
        })
    }

    /// Queue a run. Any run for an older generation that is still queued
    /// or executing is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker thread has
    /// stopped.
    pub fn submit(&self, request: RunRequest) -> Result<(), WorkerError> {
        self.latest.fetch_max(request.generation, Ordering::AcqRel);
        self.requests
            .as_ref()
            .ok_or(WorkerError::Disconnected)?
            .send(request)
            .map_err(|_| WorkerError::Disconnected)
    }

    /// The newest generation submitted so far.
    #[must_use]
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Block until the next completion arrives.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker thread has
    /// stopped.
    pub fn recv(&self) -> Result<Completion, WorkerError> {
        self.completions
            .recv()
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Timeout`] if nothing arrived in time and
    /// [`WorkerError::Disconnected`] if the worker thread has stopped.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Completion, WorkerError> {
        self.completions.recv_timeout(timeout).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => WorkerError::Timeout(timeout),
            mpsc::RecvTimeoutError::Disconnected => WorkerError::Disconnected,
        })
    }

    /// Take a completion if one is ready, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker thread has
    /// stopped and nothing is left to read.
    pub fn try_recv(&self) -> Result<Option<Completion>, WorkerError> {
        match self.completions.try_recv() {
            Ok(completion) => Ok(Some(completion)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

impl Drop for StickerWorker {
    fn drop(&mut self) {
        // Cancel whatever is running, then close the queue so the
        // thread's receive loop ends.
        self.latest.store(u64::MAX, Ordering::Release);
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("sticker worker thread panicked");
        }
    }
}

/// Worker thread body.
fn serve(
    requests: &mpsc::Receiver<RunRequest>,
    completions: &mpsc::Sender<Completion>,
    latest: &AtomicU64,
) {
    while let Ok(mut request) = requests.recv() {
        // Only the newest queued request matters.
        while let Ok(newer) = requests.try_recv() {
            log::debug!("skipping queued generation {}", request.generation);
            request = newer;
        }

        let generation = request.generation;
        let outcome = run(&request, latest);
        if completions.send(Completion { generation, outcome }).is_err() {
            break;
        }
    }
    log::trace!("sticker worker exiting");
}

/// Drive `request` through the pipeline one stage at a time, giving up as
/// soon as a newer generation has been submitted.
fn run(request: &RunRequest, latest: &AtomicU64) -> Result<ProcessResult, PipelineError> {
    let decoded = Pipeline::from_image((*request.source).clone(), request.request);
    let mut stage = Stage::from(decoded);
    loop {
        if latest.load(Ordering::Acquire) != request.generation {
            log::debug!(
                "generation {} cancelled before stage {}",
                request.generation,
                stage.name()
            );
            return Err(PipelineError::Cancelled);
        }
        match stage.advance()? {
            Advance::Next(next) => stage = next,
            Advance::Complete(done) => return done.complete(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use image::Rgba;
    use sticker_pipeline::{Phase, RgbaImage, StickerRequest, codec};

    use super::*;

    const WAIT: Duration = Duration::from_secs(30);

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(24, 24, |x, y| {
            if (8..16).contains(&x) && (8..16).contains(&y) {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        codec::encode_png(&img).unwrap()
    }

    fn direct_request(generation: u64) -> RunRequest {
        RunRequest {
            generation,
            source: Arc::new(RgbaImage::from_pixel(6, 4, Rgba([9, 9, 9, 255]))),
            request: StickerRequest::default(),
        }
    }

    #[test]
    fn run_completes_for_latest_generation() {
        let latest = AtomicU64::new(3);
        let result = run(&direct_request(3), &latest).unwrap();
        assert_eq!(result.output_dimensions().width, 6 + 2 * 15);
    }

    #[test]
    fn run_is_cancelled_when_superseded() {
        let latest = AtomicU64::new(4);
        let result = run(&direct_request(3), &latest);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn worker_result_is_applied_to_session() {
        let worker = StickerWorker::spawn().unwrap();
        let mut session = Session::new();
        let request = session.upload(&sample_png()).unwrap();
        worker.submit(request).unwrap();

        let completion = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(completion.generation, 1);
        assert_eq!(completion.publish_to(&mut session), Publication::Applied);
        assert_eq!(session.state().phase, Phase::Ready);
    }

    #[test]
    fn only_the_newest_result_is_applied() {
        let worker = StickerWorker::spawn().unwrap();
        let mut session = Session::new();
        worker.submit(session.upload(&sample_png()).unwrap()).unwrap();
        worker.submit(session.set_thickness(2).unwrap()).unwrap();
        worker.submit(session.set_thickness(7).unwrap()).unwrap();
        assert_eq!(worker.latest_generation(), 3);

        loop {
            let completion = worker.recv_timeout(WAIT).unwrap();
            let generation = completion.generation;
            let publication = completion.publish_to(&mut session);
            if generation == 3 {
                assert_eq!(publication, Publication::Applied);
                break;
            }
            assert_eq!(publication, Publication::Stale);
        }

        let result = session.state().result.as_ref().unwrap();
        assert_eq!(result.output_dimensions().width, 24 + 2 * 7);
    }

    #[test]
    fn try_recv_is_empty_before_any_submission() {
        let worker = StickerWorker::spawn().unwrap();
        assert!(worker.try_recv().unwrap().is_none());
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let worker = StickerWorker::spawn().unwrap();
        let err = worker
            .recv_timeout(Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, WorkerError::Timeout(_)));
    }

    #[test]
    fn drop_joins_with_work_in_flight() {
        let worker = StickerWorker::spawn().unwrap();
        worker.submit(direct_request(1)).unwrap();
        drop(worker);
    }
}
