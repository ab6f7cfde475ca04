//! Per-object track state.

use crate::tracker::matching::{Candidate, Signature};
use crate::tracker::motion::{MotionFilter, MotionState};
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackStatus;

/// Identity-stable tracked object.
///
/// The id is assigned at creation and never changes while the tracklet is
/// live. The box always lives in the source frame's pixel space.
#[derive(Debug, Clone)]
pub struct Tracklet {
    pub id: u64,
    pub label: u32,
    pub status: TrackStatus,
    /// Current box in source-frame pixel space.
    pub rect: Rect,
    /// Confidence of the most recent matching detection.
    pub confidence: f32,
    /// Appearance signature from the most recent matching detection.
    pub signature: Option<Signature>,
    /// Consecutive detection cycles without a matching detection.
    pub miss_count: u32,
    /// Sequence number of the frame that created the tracklet.
    pub start_seq: u64,
    /// Sequence number of the last frame with a matching detection.
    pub last_seq: u64,
    motion: Option<MotionState>,
}

impl Tracklet {
    pub(crate) fn new(id: u64, cand: &Candidate, seq: u64, filter: Option<&MotionFilter>) -> Self {
        Self {
            id,
            label: cand.label,
            status: TrackStatus::New,
            rect: cand.rect,
            confidence: cand.confidence,
            signature: cand.signature,
            miss_count: 0,
            start_seq: seq,
            last_seq: seq,
            motion: filter.map(|f| f.initiate(cand.rect.center(), cand.rect.height)),
        }
    }

    /// Take a matched detection's box, confidence and signature.
    pub(crate) fn apply_match(
        &mut self,
        cand: &Candidate,
        seq: u64,
        filter: Option<&MotionFilter>,
    ) {
        if let (Some(filter), Some(state)) = (filter, &self.motion) {
            self.motion = Some(filter.update(state, cand.rect.center(), cand.rect.height));
        }
        self.rect = cand.rect;
        self.confidence = cand.confidence;
        if cand.signature.is_some() {
            self.signature = cand.signature;
        }
        self.miss_count = 0;
        self.last_seq = seq;
        // status stays as-is: Lost tracklets are purged before the next
        // cycle, so a match can only land on New or Tracked
    }

    /// Count a detection cycle that produced no match for this tracklet.
    pub(crate) fn record_miss(&mut self, tolerance: u32) {
        self.miss_count += 1;
        if self.miss_count > tolerance {
            self.status = TrackStatus::Lost;
        }
    }

    /// Advance through a frame without a detection batch: keep the last box,
    /// or extrapolate it when a motion filter is attached. A box that has
    /// left the frame entirely makes the tracklet lost.
    pub(crate) fn carry_forward(
        &mut self,
        filter: Option<&MotionFilter>,
        width: u32,
        height: u32,
    ) {
        if let (Some(filter), Some(state)) = (filter, &self.motion) {
            let predicted = filter.predict(state, self.rect.height);
            let (cx, cy) = predicted.center();
            self.rect = self.rect.centered_at(cx, cy);
            self.motion = Some(predicted);
        }
        if !self.rect.overlaps_bounds(width as f32, height as f32) {
            self.status = TrackStatus::Lost;
        }
    }

    /// First emission done: a new tracklet is tracked from the next frame on.
    pub(crate) fn confirm(&mut self) {
        if self.status == TrackStatus::New {
            self.status = TrackStatus::Tracked;
        }
    }

    /// Point-in-time view for an aligned result.
    pub fn snapshot(&self) -> TrackletSnapshot {
        TrackletSnapshot {
            id: self.id,
            label: self.label,
            rect: self.rect,
            status: self.status,
            confidence: self.confidence,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: u64, label: u32, rect: Rect) -> Self {
        Self {
            id,
            label,
            status: TrackStatus::Tracked,
            rect,
            confidence: 1.0,
            signature: None,
            miss_count: 0,
            start_seq: 0,
            last_seq: 0,
            motion: None,
        }
    }
}

/// Snapshot of one tracklet as delivered to the output sink.
#[derive(Debug, Clone, Copy)]
pub struct TrackletSnapshot {
    pub id: u64,
    pub label: u32,
    /// Box in source-frame pixel space.
    pub rect: Rect,
    pub status: TrackStatus,
    pub confidence: f32,
}
