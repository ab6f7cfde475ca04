//! Source and sink boundaries of the pipeline.

use crate::error::PipelineError;
use crate::pipeline::frame::Frame;
use crate::tracker::AlignedResult;

/// Produces timestamped, sequence-numbered frames.
///
/// Sequence numbers must increase monotonically and are never reused, even
/// for frames the pipeline later drops.
pub trait FrameSource {
    /// Pull the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
}

/// Consumes aligned results, one per frame, in frame-arrival order.
///
/// A sink that blocks becomes the pipeline's backpressure point; a sink
/// that returns an error terminates the run.
pub trait OutputSink {
    fn consume(&mut self, result: AlignedResult) -> Result<(), PipelineError>;
}
