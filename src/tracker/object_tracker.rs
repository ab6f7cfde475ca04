//! The tracker state machine.
//!
//! Frames arrive on every cycle; detection batches arrive late and only for
//! some frames. The tracker is the synchronization point: it holds frames in
//! a bounded pending queue until their disposition is known, folds detection
//! batches into the live tracklet set, and emits exactly one aligned result
//! per ingested frame, in arrival order.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::debug;

use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::pipeline::{DetectionBatch, Frame};
use crate::tracker::id_policy::{IdAssigner, IdPolicy};
use crate::tracker::matching::{self, AssociationStrategy, Candidate, Signature};
use crate::tracker::motion::MotionFilter;
use crate::tracker::track_state::TrackStatus;
use crate::tracker::tracklet::{Tracklet, TrackletSnapshot};

/// Configuration for the [`ObjectTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Minimum detection confidence to participate in tracking.
    pub confidence_threshold: f32,
    /// Label ids eligible for tracking; empty means every label.
    pub track_labels: Vec<u32>,
    pub strategy: AssociationStrategy,
    pub id_policy: IdPolicy,
    /// Minimum association score for a detection to take over a tracklet.
    pub match_threshold: f32,
    /// Missed detection cycles tolerated before a tracklet becomes lost.
    pub miss_tolerance: u32,
    /// Extrapolate boxes on frames without detections instead of freezing them.
    pub motion_extrapolation: bool,
    /// Frames allowed to wait for their detections at any one time.
    pub pending_frames: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            track_labels: Vec::new(),
            strategy: AssociationStrategy::default(),
            id_policy: IdPolicy::default(),
            match_threshold: 0.3,
            miss_tolerance: 2,
            motion_extrapolation: false,
            pending_frames: 4,
        }
    }
}

/// One frame paired with a snapshot of every tracklet alive at that frame.
#[derive(Debug, Clone)]
pub struct AlignedResult {
    pub frame: Frame,
    pub tracklets: Vec<TrackletSnapshot>,
}

/// Aligns frames with their (possibly absent) detection batches and owns all
/// tracklet state.
///
/// Single writer: every mutation of the tracklet set happens through this
/// struct on whichever task owns it. The pipeline runner keeps it on one
/// thread; nothing here is `Sync`-shared.
pub struct ObjectTracker {
    config: TrackerConfig,
    pending: VecDeque<Frame>,
    batches: HashMap<u64, DetectionBatch>,
    /// Highest batch seq seen; FIFO detector order means a batch for a later
    /// frame proves earlier frames were skipped.
    latest_batch_seq: Option<u64>,
    detector_finished: bool,
    tracklets: Vec<Tracklet>,
    assigner: IdAssigner,
    motion: MotionFilter,
    metrics: Arc<PipelineMetrics>,
    last_emitted_seq: Option<u64>,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_metrics(config, Arc::default())
    }

    pub fn with_metrics(config: TrackerConfig, metrics: Arc<PipelineMetrics>) -> Self {
        let assigner = IdAssigner::new(config.id_policy);
        Self {
            config,
            pending: VecDeque::new(),
            batches: HashMap::new(),
            latest_batch_seq: None,
            detector_finished: false,
            tracklets: Vec::new(),
            assigner,
            motion: MotionFilter::new(),
            metrics,
            last_emitted_seq: None,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Frames currently waiting for an aligned result.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue a frame for alignment.
    ///
    /// Fails when the pending queue is full; the caller must emit (or force)
    /// the head first. The runner does this before every ingest.
    pub fn ingest_frame(&mut self, frame: Frame) -> Result<(), PipelineError> {
        if self.pending.len() >= self.config.pending_frames {
            return Err(PipelineError::QueueOverflow { stage: "alignment" });
        }
        self.pending.push_back(frame);
        Ok(())
    }

    /// File a detection batch under its frame's sequence number.
    ///
    /// A batch whose frame was already emitted is discarded and counted,
    /// never applied retroactively.
    pub fn ingest_detections(&mut self, batch: DetectionBatch) {
        if self.last_emitted_seq.is_some_and(|s| batch.seq <= s) {
            debug!("discarding stale detection batch for frame {}", batch.seq);
            PipelineMetrics::incr(&self.metrics.stale_detections);
            return;
        }
        self.latest_batch_seq = Some(
            self.latest_batch_seq
                .map_or(batch.seq, |s| s.max(batch.seq)),
        );
        self.batches.insert(batch.seq, batch);
    }

    /// No further batches will arrive; every pending frame is decidable now.
    pub fn finish_detections(&mut self) {
        self.detector_finished = true;
    }

    /// Emit the head frame if its disposition is decidable: its batch is
    /// here, a later batch proves the detector skipped it, or the detector
    /// is finished.
    pub fn poll_aligned(&mut self) -> Option<AlignedResult> {
        let head_seq = self.pending.front()?.seq;
        let decidable = self.batches.contains_key(&head_seq)
            || self.detector_finished
            || self.latest_batch_seq.is_some_and(|s| s > head_seq);
        if !decidable {
            return None;
        }
        let frame = self.pending.pop_front()?;
        Some(self.align(frame))
    }

    /// Emit the head frame without detections. Used by the runner when the
    /// per-frame detection wait expires, so the tracker never blocks forever
    /// on a batch that will never arrive.
    pub fn force_align_head(&mut self) -> Option<AlignedResult> {
        let frame = self.pending.pop_front()?;
        Some(self.align(frame))
    }

    /// Drop every pending frame without emitting. Returns the number dropped.
    pub fn discard_pending(&mut self) -> usize {
        let n = self.pending.len();
        if n > 0 {
            self.metrics
                .frames_dropped
                .fetch_add(n as u64, Ordering::Relaxed);
            self.pending.clear();
        }
        n
    }

    fn align(&mut self, frame: Frame) -> AlignedResult {
        match self.batches.remove(&frame.seq) {
            Some(batch) => self.associate(&frame, batch),
            None => self.carry_forward(&frame),
        }
        self.emit(frame)
    }

    /// A detection cycle: score every live tracklet against every eligible
    /// detection, assign, and advance lifecycles.
    fn associate(&mut self, frame: &Frame, batch: DetectionBatch) {
        let strategy = self.config.strategy;
        let candidates: Vec<Candidate> = batch
            .detections
            .iter()
            .filter(|d| d.confidence >= self.config.confidence_threshold)
            .filter(|d| {
                self.config.track_labels.is_empty()
                    || self.config.track_labels.contains(&d.label)
            })
            .map(|d| {
                let rect = batch.frame.transform.to_source(&d.bbox);
                let signature = match strategy {
                    AssociationStrategy::Appearance => Signature::from_region(frame, &rect),
                    AssociationStrategy::Geometric => None,
                };
                Candidate {
                    label: d.label,
                    confidence: d.confidence,
                    rect,
                    signature,
                }
            })
            .collect();

        let filter = self.config.motion_extrapolation.then_some(&self.motion);
        let scores = matching::score_matrix(&self.tracklets, &candidates, strategy);
        let result = matching::assign(&scores, self.config.match_threshold);

        for &(ti, ci) in &result.matches {
            self.tracklets[ti].apply_match(&candidates[ci], frame.seq, filter);
        }

        for &ti in &result.unmatched_tracks {
            let track = &mut self.tracklets[ti];
            track.record_miss(self.config.miss_tolerance);
            if track.status == TrackStatus::Lost {
                debug!(
                    "tracklet {} lost after {} missed detection cycles",
                    track.id, track.miss_count
                );
            }
        }

        for &ci in &result.unmatched_detections {
            // ids held by any existing tracklet are off-limits, including
            // ones becoming lost this very frame
            let live: BTreeSet<u64> = self.tracklets.iter().map(|t| t.id).collect();
            let id = self.assigner.assign(&live);
            debug!(
                "tracklet {} created at frame {} for label {}",
                id, frame.seq, candidates[ci].label
            );
            self.tracklets
                .push(Tracklet::new(id, &candidates[ci], frame.seq, filter));
        }
    }

    /// No batch for this frame: carry every live tracklet forward. Miss
    /// counters are untouched; only detection cycles count as misses.
    fn carry_forward(&mut self, frame: &Frame) {
        let filter = self.config.motion_extrapolation.then_some(&self.motion);
        for track in &mut self.tracklets {
            track.carry_forward(filter, frame.width, frame.height);
            if track.status == TrackStatus::Lost {
                debug!("tracklet {} lost: box left the frame", track.id);
            }
        }
    }

    fn emit(&mut self, frame: Frame) -> AlignedResult {
        let tracklets: Vec<TrackletSnapshot> =
            self.tracklets.iter().map(Tracklet::snapshot).collect();

        // lost tracklets were reported in this snapshot, exactly once
        self.tracklets.retain(|t| t.status != TrackStatus::Lost);
        for track in &mut self.tracklets {
            track.confirm();
        }

        // batches for earlier frames can never be aligned anymore (their
        // frame was dropped upstream or force-aligned without them)
        let before = self.batches.len();
        self.batches.retain(|&seq, _| seq > frame.seq);
        let unreachable = (before - self.batches.len()) as u64;
        if unreachable > 0 {
            debug!(
                "discarded {} unreachable detection batch(es) at frame {}",
                unreachable, frame.seq
            );
            self.metrics
                .stale_detections
                .fetch_add(unreachable, Ordering::Relaxed);
        }

        self.last_emitted_seq = Some(frame.seq);
        PipelineMetrics::incr(&self.metrics.results_emitted);
        AlignedResult { frame, tracklets }
    }
}
