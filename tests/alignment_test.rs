use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trackflow_rs::{
    AlignedResult, AssociationStrategy, Detection, DetectionBatch, Detector, Frame, FrameSource,
    NormRect, OutputSink, Pipeline, PipelineConfig, PipelineError, PixelLayout, PreprocessedFrame,
    QueueConfig, TrackStatus, TrackerConfig,
};

const W: u32 = 64;
const H: u32 = 48;

/// Replayable source producing `total` black frames, seq 1..=total.
struct ScriptedSource {
    next_seq: u64,
    total: u64,
}

impl ScriptedSource {
    fn new(total: u64) -> Self {
        Self { next_seq: 1, total }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.next_seq > self.total {
            return Ok(None);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Some(Frame::new(
            vec![0; (W * H * 3) as usize],
            W,
            H,
            PixelLayout::Bgr8,
            Duration::from_millis(seq * 33),
            seq,
        )?))
    }
}

/// Detector that answers instantly for scripted frames and silently skips
/// the rest, like a backend running at a lower rate than the frame stream.
struct ScriptedDetector {
    script: HashMap<u64, Vec<Detection>>,
    ready: VecDeque<DetectionBatch>,
    closes: Arc<AtomicUsize>,
}

impl Detector for ScriptedDetector {
    fn submit(&mut self, frame: PreprocessedFrame) -> Result<(), PipelineError> {
        if let Some(detections) = self.script.remove(&frame.seq) {
            self.ready.push_back(DetectionBatch {
                seq: frame.seq,
                detections,
                frame,
            });
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<DetectionBatch>, PipelineError> {
        Ok(self.ready.pop_front())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that goes away on the first poll.
struct FailingDetector {
    closes: Arc<AtomicUsize>,
}

impl Detector for FailingDetector {
    fn submit(&mut self, _frame: PreprocessedFrame) -> Result<(), PipelineError> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<DetectionBatch>, PipelineError> {
        Err(PipelineError::DetectorUnavailable("link down".into()))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that accepts every frame and never answers.
struct SilentDetector;

impl Detector for SilentDetector {
    fn submit(&mut self, _frame: PreprocessedFrame) -> Result<(), PipelineError> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<DetectionBatch>, PipelineError> {
        Ok(None)
    }
}

#[derive(Clone)]
struct CollectSink(Arc<Mutex<Vec<AlignedResult>>>);

impl CollectSink {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn results(&self) -> Vec<AlignedResult> {
        self.0.lock().unwrap().clone()
    }
}

impl OutputSink for CollectSink {
    fn consume(&mut self, result: AlignedResult) -> Result<(), PipelineError> {
        self.0.lock().unwrap().push(result);
        Ok(())
    }
}

fn det(label: u32, confidence: f32, bbox: [f32; 4]) -> Detection {
    Detection::new(
        label,
        confidence,
        NormRect::new(bbox[0], bbox[1], bbox[2], bbox[3]),
    )
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        tracker: TrackerConfig {
            strategy: AssociationStrategy::Geometric,
            track_labels: vec![1],
            // larger than the frame count so alignment is driven purely by
            // batch arrival and end-of-stream, never by backlog forcing
            pending_frames: 16,
            ..TrackerConfig::default()
        },
        // blocking on the detect branch so every scripted frame reaches the
        // detector regardless of scheduling
        detect_queue: QueueConfig::blocking(4),
        detection_wait: Duration::from_millis(500),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_end_to_end_alignment() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut script = HashMap::new();
    script.insert(3, vec![det(1, 0.9, [0.1, 0.1, 0.3, 0.3])]);
    script.insert(6, vec![det(1, 0.85, [0.12, 0.12, 0.32, 0.32])]);
    script.insert(9, vec![det(1, 0.8, [0.14, 0.14, 0.34, 0.34])]);

    let closes = Arc::new(AtomicUsize::new(0));
    let detector = ScriptedDetector {
        script,
        ready: VecDeque::new(),
        closes: closes.clone(),
    };
    let sink = CollectSink::new();

    let pipeline = Pipeline::new(ScriptedSource::new(10), detector, sink.clone(), test_config());
    let report = pipeline.run().unwrap();

    let results = sink.results();

    // one result per frame, in arrival order
    assert_eq!(results.len(), 10);
    let seqs: Vec<u64> = results.iter().map(|r| r.frame.seq).collect();
    assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
    assert_eq!(report.frames_ingested, 10);
    assert_eq!(report.results_emitted, 10);

    // nothing to track before the first detection lands
    assert!(results[0].tracklets.is_empty());
    assert!(results[1].tracklets.is_empty());

    // one tracklet from frame 3 on, id stable, New exactly once
    let id = results[2].tracklets[0].id;
    for (i, result) in results.iter().enumerate().skip(2) {
        assert_eq!(result.tracklets.len(), 1, "frame {}", result.frame.seq);
        let track = &result.tracklets[0];
        assert_eq!(track.id, id);
        assert_eq!(track.label, 1);
        let expected = if i == 2 {
            TrackStatus::New
        } else {
            TrackStatus::Tracked
        };
        assert_eq!(track.status, expected, "frame {}", result.frame.seq);
    }

    // frames without detections carry the last box forward unchanged
    assert_eq!(results[3].tracklets[0].rect, results[2].tracklets[0].rect);
    assert_eq!(results[4].tracklets[0].rect, results[2].tracklets[0].rect);

    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_detector_failure_terminates_run() {
    let _ = env_logger::builder().is_test(true).try_init();

    let closes = Arc::new(AtomicUsize::new(0));
    let detector = FailingDetector {
        closes: closes.clone(),
    };
    let sink = CollectSink::new();

    let pipeline = Pipeline::new(ScriptedSource::new(100), detector, sink, test_config());
    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, PipelineError::DetectorUnavailable(_)));
    // the backend handle is still released exactly once
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unanswered_frames_align_by_timeout() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sink = CollectSink::new();
    let config = PipelineConfig {
        detection_wait: Duration::from_millis(30),
        ..test_config()
    };

    let pipeline = Pipeline::new(ScriptedSource::new(5), SilentDetector, sink.clone(), config);
    let report = pipeline.run().unwrap();

    // the tracker never blocks on batches that will not arrive
    let results = sink.results();
    assert_eq!(results.len(), 5);
    assert_eq!(report.results_emitted, 5);
    assert!(results.iter().all(|r| r.tracklets.is_empty()));
}
