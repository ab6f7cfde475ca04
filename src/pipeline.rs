//! Pipeline stages around the tracker core.
//!
//! This module holds the boundary contracts (frame source, detector,
//! output sink), the preprocessing stage, the bounded stage queues, and
//! the orchestrator that wires them together.

mod detector;
mod frame;
mod io;
mod preprocess;
mod queue;
mod runner;

pub use detector::{DetectionBatch, Detector};
pub use frame::{Frame, PixelLayout, PreprocessedFrame};
pub use io::{FrameSource, OutputSink};
pub use preprocess::{AspectMode, PreprocessConfig, Preprocessor, ViewTransform};
pub use queue::{OverflowPolicy, QueueConfig};
pub use runner::{DrainPolicy, Pipeline, PipelineConfig};
