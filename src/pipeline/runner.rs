//! Pipeline orchestration: stage wiring, scheduling and lifecycle.
//!
//! Three tasks run under a thread scope: acquisition pulls frames from the
//! source and fans them out to both branches, the detection worker owns the
//! detector backend, and the calling thread runs the tracker merge loop.
//! The tracker task is the only writer of tracker state.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, select};
use log::{debug, info, warn};

use crate::error::PipelineError;
use crate::metrics::{PipelineMetrics, PipelineReport};
use crate::pipeline::detector::{DetectionBatch, Detector};
use crate::pipeline::frame::Frame;
use crate::pipeline::io::{FrameSource, OutputSink};
use crate::pipeline::preprocess::{PreprocessConfig, Preprocessor};
use crate::pipeline::queue::{self, QueueConfig};
use crate::tracker::{ObjectTracker, TrackerConfig};

/// Backend poll / idle tick granularity.
const POLL_TICK: Duration = Duration::from_millis(1);

/// What happens to frames still awaiting alignment at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Emit every pending frame, without detections where none arrived.
    #[default]
    DrainAll,
    /// Drop pending frames, counting them.
    DiscardPending,
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub tracker: TrackerConfig,
    /// Source → tracker queue. Blocking backpressure suits replayable
    /// sources; a drop policy suits live cameras.
    pub frame_queue: QueueConfig,
    /// Source → detection branch queue.
    pub detect_queue: QueueConfig,
    /// How long the head frame may wait for its detection batch before it
    /// is aligned without one.
    pub detection_wait: Duration,
    pub drain: DrainPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            tracker: TrackerConfig::default(),
            frame_queue: QueueConfig::blocking(4),
            detect_queue: QueueConfig::drop_newest(4),
            detection_wait: Duration::from_millis(100),
            drain: DrainPolicy::default(),
        }
    }
}

/// Wires source → preprocessor → detector and source → tracker, and runs
/// the whole dataflow to completion.
pub struct Pipeline<S, D, K> {
    source: S,
    detector: D,
    sink: K,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
}

impl<S, D, K> Pipeline<S, D, K>
where
    S: FrameSource + Send,
    D: Detector + Send,
    K: OutputSink,
{
    pub fn new(source: S, detector: D, sink: K, config: PipelineConfig) -> Self {
        Self {
            source,
            detector,
            sink,
            config,
            metrics: Arc::new(PipelineMetrics::default()),
        }
    }

    /// Shared handle to the run's counters, readable while the run is live.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Run until the source ends and all queues drain, or until a fatal
    /// error stops the run. Non-fatal conditions never interrupt the
    /// result stream; they only show up in the report's counters.
    pub fn run(self) -> Result<PipelineReport, PipelineError> {
        let Pipeline {
            source,
            detector,
            mut sink,
            config,
            metrics,
        } = self;

        info!("pipeline starting");
        let preprocessor = Preprocessor::new(config.preprocess.clone());
        let mut tracker = ObjectTracker::with_metrics(config.tracker.clone(), metrics.clone());

        let (frame_tx, frame_rx) =
            queue::stage_queue::<Frame>("tracker-frames", &config.frame_queue, metrics.clone());
        let (detect_tx, detect_rx) =
            queue::stage_queue::<Frame>("detect-frames", &config.detect_queue, metrics.clone());
        // finished batches must not be dropped silently; blocking is safe
        // because the tracker task always drains this queue
        let (batch_tx, batch_rx) = queue::stage_queue::<DetectionBatch>(
            "detections",
            &QueueConfig::blocking(config.detect_queue.depth),
            metrics.clone(),
        );

        let stop = AtomicBool::new(false);
        let fatal: Mutex<Option<PipelineError>> = Mutex::new(None);
        let record_fatal = |err: PipelineError| {
            warn!("pipeline fatal: {err}");
            let mut slot = match fatal.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.get_or_insert(err);
            stop.store(true, Ordering::SeqCst);
        };
        let drain_patience = config.detection_wait.max(Duration::from_millis(50));

        std::thread::scope(|scope| {
            // detection worker: owns the backend handle, closes it exactly
            // once. Started before acquisition so the backend is up before
            // frames flow.
            {
                let preprocessor = &preprocessor;
                let stop = &stop;
                let metrics = metrics.clone();
                let mut detector = detector;
                scope.spawn(move || {
                    let mut in_flight: usize = 0;
                    'stream: loop {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        match detect_rx.recv_timeout(POLL_TICK) {
                            Ok(frame) => match preprocessor.prepare(&frame) {
                                Ok(prepared) => {
                                    if let Err(err) = detector.submit(prepared) {
                                        record_fatal(err);
                                        break 'stream;
                                    }
                                    in_flight += 1;
                                }
                                Err(err) => {
                                    // skipped locally; the tracker times the
                                    // frame out and carries tracklets forward
                                    warn!("skipping frame {}: {err}", frame.seq);
                                    PipelineMetrics::incr(&metrics.invalid_frames);
                                }
                            },
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => break 'stream,
                        }
                        // forward every batch the backend has finished
                        loop {
                            match detector.poll() {
                                Ok(Some(batch)) => {
                                    in_flight = in_flight.saturating_sub(1);
                                    if batch_tx.send(batch).is_err() {
                                        break 'stream;
                                    }
                                }
                                Ok(None) => break,
                                Err(err) => {
                                    record_fatal(err);
                                    break 'stream;
                                }
                            }
                        }
                    }
                    // drain in-flight inference before closing the backend
                    let mut idle = Duration::ZERO;
                    while in_flight > 0 && !stop.load(Ordering::SeqCst) {
                        match detector.poll() {
                            Ok(Some(batch)) => {
                                idle = Duration::ZERO;
                                in_flight -= 1;
                                if batch_tx.send(batch).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                if idle >= drain_patience {
                                    warn!("giving up on {in_flight} in-flight frame(s)");
                                    break;
                                }
                                std::thread::sleep(POLL_TICK);
                                idle += POLL_TICK;
                            }
                            Err(err) => {
                                record_fatal(err);
                                break;
                            }
                        }
                    }
                    detector.close();
                    debug!("detection worker stopped");
                });
            }

            // acquisition: frames fan out to both branches; the detection
            // branch gets its own copy, no buffer is ever shared
            {
                let stop = &stop;
                let metrics = metrics.clone();
                let mut source = source;
                scope.spawn(move || {
                    loop {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        match source.next_frame() {
                            Ok(Some(frame)) => {
                                PipelineMetrics::incr(&metrics.frames_ingested);
                                if detect_tx.send(frame.clone()).is_err()
                                    || frame_tx.send(frame).is_err()
                                {
                                    break;
                                }
                            }
                            Ok(None) => {
                                debug!("source end of stream");
                                break;
                            }
                            Err(err) => {
                                record_fatal(err);
                                break;
                            }
                        }
                    }
                });
            }

            // tracker merge loop: the single writer of tracker state
            let never_frame = crossbeam_channel::never::<Frame>();
            let never_batch = crossbeam_channel::never::<DetectionBatch>();
            let mut frames_open = true;
            let mut batches_open = true;
            let mut head_deadline: Option<Instant> = None;

            'run: loop {
                while let Some(result) = tracker.poll_aligned() {
                    head_deadline = None;
                    if let Err(err) = sink.consume(result) {
                        record_fatal(err);
                        break 'run;
                    }
                }

                if stop.load(Ordering::SeqCst) {
                    break;
                }

                if !frames_open && !batches_open {
                    if tracker.pending_len() == 0 {
                        break;
                    }
                    match config.drain {
                        // finish_detections() already made every pending
                        // frame decidable; the poll loop above drains them
                        DrainPolicy::DrainAll => continue,
                        DrainPolicy::DiscardPending => {
                            tracker.discard_pending();
                            break;
                        }
                    }
                }

                let timeout = if tracker.pending_len() > 0 {
                    let deadline = *head_deadline
                        .get_or_insert_with(|| Instant::now() + config.detection_wait);
                    deadline.saturating_duration_since(Instant::now())
                } else {
                    head_deadline = None;
                    config.detection_wait
                };

                let frx = if frames_open { &frame_rx } else { &never_frame };
                let brx = if batches_open { &batch_rx } else { &never_batch };

                select! {
                    recv(frx) -> msg => match msg {
                        Ok(frame) => {
                            // alignment queue full: the head gives way before
                            // the new frame enters, preserving arrival order
                            if tracker.pending_len() >= config.tracker.pending_frames {
                                if let Some(result) = tracker.force_align_head() {
                                    head_deadline = None;
                                    PipelineMetrics::incr(&metrics.detection_timeouts);
                                    if let Err(err) = sink.consume(result) {
                                        record_fatal(err);
                                        break 'run;
                                    }
                                }
                            }
                            if let Err(err) = tracker.ingest_frame(frame) {
                                record_fatal(err);
                                break 'run;
                            }
                        }
                        Err(_) => {
                            debug!("frame stream closed");
                            frames_open = false;
                        }
                    },
                    recv(brx) -> msg => match msg {
                        Ok(batch) => tracker.ingest_detections(batch),
                        Err(_) => {
                            debug!("detection stream closed");
                            batches_open = false;
                            tracker.finish_detections();
                        }
                    },
                    default(timeout) => {
                        if let Some(result) = tracker.force_align_head() {
                            debug!("detection wait expired for frame {}", result.frame.seq);
                            PipelineMetrics::incr(&metrics.detection_timeouts);
                            head_deadline = None;
                            if let Err(err) = sink.consume(result) {
                                record_fatal(err);
                                break 'run;
                            }
                        }
                    }
                }
            }

            // unblock any producer stuck on a full queue so the scope can join
            drop(frame_rx);
            drop(batch_rx);
        });

        let fatal = match fatal.into_inner() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let report = metrics.snapshot();
        match fatal {
            Some(err) => Err(err),
            None => {
                info!(
                    "pipeline stopped: {} frames in, {} results out",
                    report.frames_ingested, report.results_emitted
                );
                Ok(report)
            }
        }
    }
}
