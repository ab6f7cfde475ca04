//! Shared counters for non-fatal pipeline conditions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the pipeline stages and the tracker.
///
/// Shared across stages via `Arc`. Increments use relaxed ordering; the
/// counters are only read for reporting, never for control flow.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Frames pulled from the source.
    pub frames_ingested: AtomicU64,
    /// Aligned results delivered to the sink.
    pub results_emitted: AtomicU64,
    /// Frames discarded by a drop overflow policy or a discarding drain.
    pub frames_dropped: AtomicU64,
    /// Detection batches that arrived after their frame was already emitted.
    pub stale_detections: AtomicU64,
    /// Frames skipped because their buffer did not match their layout.
    pub invalid_frames: AtomicU64,
    /// Head frames aligned without detections because the wait expired or
    /// the alignment queue needed room.
    pub detection_timeouts: AtomicU64,
}

impl PipelineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> PipelineReport {
        PipelineReport {
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            stale_detections: self.stale_detections.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            detection_timeouts: self.detection_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Final counter values for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_ingested: u64,
    pub results_emitted: u64,
    pub frames_dropped: u64,
    pub stale_detections: u64,
    pub invalid_frames: u64,
    pub detection_timeouts: u64,
}
