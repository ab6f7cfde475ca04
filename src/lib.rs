//! Real-time object detection-to-tracklet pipeline.
//!
//! Frames are ingested from a source, run through an asynchronous detection
//! stage, and fused frame-over-frame into identity-stable tracklets with
//! lifecycle status. Detections do not arrive for every frame; the tracker
//! is the synchronization point between the dense frame timeline and the
//! sparse, delayed detection stream, emitting exactly one aligned result
//! per frame, in arrival order. The pipeline runner wires the stages
//! together with bounded, policy-carrying queues.

pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod tracker;

pub use error::PipelineError;
pub use metrics::{PipelineMetrics, PipelineReport};
pub use pipeline::{
    AspectMode, DetectionBatch, Detector, DrainPolicy, Frame, FrameSource, OutputSink,
    OverflowPolicy, PixelLayout, Pipeline, PipelineConfig, PreprocessConfig, PreprocessedFrame,
    Preprocessor, QueueConfig, ViewTransform,
};
pub use tracker::{
    AlignedResult, AssociationStrategy, Detection, IdPolicy, NormRect, ObjectTracker, Rect,
    Signature, TrackStatus, TrackerConfig, Tracklet, TrackletSnapshot,
};
