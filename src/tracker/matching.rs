//! Detection-to-tracklet association: similarity scoring and assignment.

use ndarray::Array2;

use crate::pipeline::Frame;
use crate::tracker::rect::{NormRect, Rect};
use crate::tracker::tracklet::Tracklet;

/// One detector-reported object from a single frame.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Label id from the detector's class set.
    pub label: u32,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Normalized relative to the preprocessed frame the detector consumed.
    pub bbox: NormRect,
}

impl Detection {
    pub fn new(label: u32, confidence: f32, bbox: NormRect) -> Self {
        Self {
            label,
            confidence,
            bbox,
        }
    }
}

/// How tracklet/detection similarity is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationStrategy {
    /// Bounding-box overlap only.
    Geometric,
    /// Overlap blended with a color-histogram comparison.
    #[default]
    Appearance,
}

/// Coarse appearance signature: an 8-bin histogram per BGR channel,
/// normalized over the sampled region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signature {
    bins: [f32; 24],
}

impl Signature {
    /// Build a signature from the frame pixels under `rect`.
    ///
    /// Returns `None` when the box does not cover any whole pixel.
    pub fn from_region(frame: &Frame, rect: &Rect) -> Option<Signature> {
        let x1 = rect.x.max(0.0) as u32;
        let y1 = rect.y.max(0.0) as u32;
        let x2 = ((rect.x + rect.width).min(frame.width as f32)).max(0.0) as u32;
        let y2 = ((rect.y + rect.height).min(frame.height as f32)).max(0.0) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let mut bins = [0f32; 24];
        for y in y1..y2 {
            for x in x1..x2 {
                let bgr = frame.pixel(x, y);
                for c in 0..3 {
                    bins[c * 8 + (bgr[c] >> 5) as usize] += 1.0;
                }
            }
        }
        let count = ((x2 - x1) * (y2 - y1)) as f32;
        for bin in &mut bins {
            *bin /= count;
        }
        Some(Signature { bins })
    }

    /// Histogram intersection, averaged over channels: 1.0 for identical
    /// color distributions, 0.0 for disjoint ones.
    pub fn similarity(&self, other: &Signature) -> f32 {
        let intersection: f32 = self
            .bins
            .iter()
            .zip(other.bins.iter())
            .map(|(a, b)| a.min(*b))
            .sum();
        intersection / 3.0
    }
}

/// A detection prepared for association: box denormalized into source pixel
/// space, with an appearance signature when the strategy wants one.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: u32,
    pub confidence: f32,
    pub rect: Rect,
    pub signature: Option<Signature>,
}

/// Pairwise tracklet/candidate similarity in [0, 1].
///
/// Association requires spatial overlap: a candidate with zero IoU against a
/// tracklet scores zero even under the appearance strategy, so an object
/// cannot be matched across the frame on color alone. Label mismatches also
/// score zero.
pub fn score_matrix(
    tracks: &[Tracklet],
    candidates: &[Candidate],
    strategy: AssociationStrategy,
) -> Array2<f32> {
    let mut scores = Array2::zeros((tracks.len(), candidates.len()));
    for (i, track) in tracks.iter().enumerate() {
        for (j, cand) in candidates.iter().enumerate() {
            if track.label != cand.label {
                continue;
            }
            let iou = track.rect.iou(&cand.rect);
            if iou <= 0.0 {
                continue;
            }
            scores[[i, j]] = match strategy {
                AssociationStrategy::Geometric => iou,
                AssociationStrategy::Appearance => {
                    match (&track.signature, &cand.signature) {
                        (Some(a), Some(b)) => 0.5 * iou + 0.5 * a.similarity(b),
                        _ => iou,
                    }
                }
            };
        }
    }
    scores
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// (track index, candidate index) pairs.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Optimal one-to-one assignment over a similarity matrix.
///
/// Pairs scoring below `min_score` are left unmatched.
pub fn assign(scores: &Array2<f32>, min_score: f32) -> AssignmentResult {
    let (num_tracks, num_dets) = scores.dim();

    if num_tracks == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_dets).collect(),
        };
    }
    if num_dets == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_tracks).collect(),
            unmatched_detections: vec![],
        };
    }

    // lapjv wants a square cost matrix; pad with a cost no real pair can reach
    let size = num_tracks.max(num_dets);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for i in 0..num_tracks {
        for j in 0..num_dets {
            padded[[i, j]] = 1.0 - scores[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut matched_dets = vec![false; num_dets];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_tracks) {
                if col < num_dets && scores[[row, col]] >= min_score {
                    matches.push((row, col));
                    matched_dets[col] = true;
                } else {
                    unmatched_tracks.push(row);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_tracks).collect();
        }
    }

    let unmatched_detections = matched_dets
        .iter()
        .enumerate()
        .filter_map(|(j, &m)| if m { None } else { Some(j) })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PixelLayout;
    use std::time::Duration;

    fn track_at(rect: Rect, label: u32) -> Tracklet {
        Tracklet::for_tests(1, label, rect)
    }

    #[test]
    fn test_score_matrix_gates_on_label_and_overlap() {
        let tracks = vec![track_at(Rect::new(0.0, 0.0, 10.0, 10.0), 1)];
        let candidates = vec![
            Candidate {
                label: 2, // wrong label, overlapping box
                confidence: 0.9,
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
                signature: None,
            },
            Candidate {
                label: 1, // right label, disjoint box
                confidence: 0.9,
                rect: Rect::new(50.0, 50.0, 10.0, 10.0),
                signature: None,
            },
            Candidate {
                label: 1, // right label, same box
                confidence: 0.9,
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
                signature: None,
            },
        ];

        let scores = score_matrix(&tracks, &candidates, AssociationStrategy::Geometric);
        assert_eq!(scores[[0, 0]], 0.0);
        assert_eq!(scores[[0, 1]], 0.0);
        assert!((scores[[0, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_assign_prefers_best_pairing() {
        let tracks = vec![
            track_at(Rect::new(0.0, 0.0, 10.0, 10.0), 1),
            track_at(Rect::new(100.0, 100.0, 10.0, 10.0), 1),
        ];
        let candidates = vec![
            Candidate {
                label: 1,
                confidence: 0.9,
                rect: Rect::new(101.0, 101.0, 10.0, 10.0),
                signature: None,
            },
            Candidate {
                label: 1,
                confidence: 0.9,
                rect: Rect::new(1.0, 1.0, 10.0, 10.0),
                signature: None,
            },
        ];

        let scores = score_matrix(&tracks, &candidates, AssociationStrategy::Geometric);
        let result = assign(&scores, 0.3);

        assert_eq!(result.matches.len(), 2);
        assert!(result.matches.contains(&(0, 1)));
        assert!(result.matches.contains(&(1, 0)));
    }

    #[test]
    fn test_assign_respects_min_score() {
        let tracks = vec![track_at(Rect::new(0.0, 0.0, 10.0, 10.0), 1)];
        let candidates = vec![Candidate {
            label: 1,
            confidence: 0.9,
            rect: Rect::new(9.0, 9.0, 10.0, 10.0), // tiny overlap
            signature: None,
        }];

        let scores = score_matrix(&tracks, &candidates, AssociationStrategy::Geometric);
        let result = assign(&scores, 0.5);

        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_assign_empty_inputs() {
        let empty = Array2::zeros((0, 3));
        let result = assign(&empty, 0.3);
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

        let empty = Array2::zeros((2, 0));
        let result = assign(&empty, 0.3);
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_signature_similarity() {
        let solid = |bgr: [u8; 3]| {
            let mut data = Vec::new();
            for _ in 0..16 {
                data.extend_from_slice(&bgr);
            }
            Frame::new(data, 4, 4, PixelLayout::Bgr8, Duration::ZERO, 0).unwrap()
        };
        let region = Rect::new(0.0, 0.0, 4.0, 4.0);

        let blue = Signature::from_region(&solid([255, 0, 0]), &region).unwrap();
        let blue2 = Signature::from_region(&solid([250, 0, 0]), &region).unwrap();
        let red = Signature::from_region(&solid([0, 0, 255]), &region).unwrap();

        assert!((blue.similarity(&blue2) - 1.0).abs() < 1e-6);
        // blue and red share only the zeroed green channel
        assert!(blue.similarity(&red) < 0.5);
    }

    #[test]
    fn test_signature_empty_region() {
        let frame = Frame::new(
            vec![0; 48],
            4,
            4,
            PixelLayout::Bgr8,
            Duration::ZERO,
            0,
        )
        .unwrap();
        assert!(Signature::from_region(&frame, &Rect::new(10.0, 10.0, 5.0, 5.0)).is_none());
    }
}
