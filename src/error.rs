//! Error taxonomy for the tracking pipeline.

use thiserror::Error;

/// Errors surfaced by pipeline stages.
///
/// Only `DetectorUnavailable`, a violated queue invariant, or a rejected sink
/// terminate a run. Everything else is handled locally and exposed through
/// the counters in [`PipelineMetrics`](crate::metrics::PipelineMetrics);
/// stale-detection discards in particular are never reported as errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input frame does not match its declared layout or dimensions.
    #[error("invalid frame format: {0}")]
    InvalidFrameFormat(String),

    /// The detection backend is gone. Fatal for the run.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// A bounded queue could not accept an item under its configured policy.
    #[error("queue overflow on stage `{stage}`")]
    QueueOverflow { stage: &'static str },

    /// A stage hung up while its peer still had items to deliver.
    #[error("stage `{stage}` disconnected")]
    StageDisconnected { stage: &'static str },

    /// The output sink refused an aligned result.
    #[error("output sink rejected result for frame {seq}")]
    SinkRejected { seq: u64 },
}
