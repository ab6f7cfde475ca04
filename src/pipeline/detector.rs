//! Boundary trait for object detection backends.

use crate::error::PipelineError;
use crate::pipeline::frame::PreprocessedFrame;
use crate::tracker::Detection;

/// One batch of detections computed from a single submitted frame.
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    /// Sequence number of the source frame (the passthrough identity).
    pub seq: u64,
    pub detections: Vec<Detection>,
    /// The preprocessed frame the detector actually consumed; carries the
    /// transform for mapping boxes back to source pixel space.
    pub frame: PreprocessedFrame,
}

/// Asynchronous detection backend.
///
/// Submission and retrieval are decoupled to model inference latency:
/// `submit` hands a frame to the backend, `poll` fetches finished batches.
/// Implementations guarantee at most one batch per submitted frame, in
/// submission order (FIFO, no reordering). Any concrete backend — an
/// in-process model, a remote inference service, an accelerator — sits
/// behind this same contract.
///
/// # Example
///
/// ```ignore
/// use trackflow_rs::{DetectionBatch, Detector, PipelineError, PreprocessedFrame};
///
/// struct MyBackend {
///     // Your inference engine here
/// }
///
/// impl Detector for MyBackend {
///     fn submit(&mut self, frame: PreprocessedFrame) -> Result<(), PipelineError> {
///         // Queue the frame for inference
///         Ok(())
///     }
///
///     fn poll(&mut self) -> Result<Option<DetectionBatch>, PipelineError> {
///         // Return a finished batch, or None while inference is in flight
///         Ok(None)
///     }
/// }
/// ```
pub trait Detector {
    /// Hand a preprocessed frame to the backend.
    fn submit(&mut self, frame: PreprocessedFrame) -> Result<(), PipelineError>;

    /// Fetch the next finished batch. `Ok(None)` while inference is still
    /// in flight. `Err(DetectorUnavailable)` is fatal for the run.
    fn poll(&mut self) -> Result<Option<DetectionBatch>, PipelineError>;

    /// Release backend resources. Called exactly once at teardown.
    fn close(&mut self) {}
}
