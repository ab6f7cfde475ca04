//! Bounded stage queues with an explicit overflow policy.
//!
//! Backpressure is a first-class, configurable behavior rather than an
//! implicit buffer property: a full queue either blocks the producer or
//! drops an item, and every drop is counted. Dropped frames keep their
//! sequence numbers; a seq is never reissued.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::{Receiver, TrySendError, bounded};
use log::debug;

use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;

/// What a full queue does with the next item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Block the producer until the consumer catches up. Preferred for
    /// replayable sources (files).
    #[default]
    Block,
    /// Evict the oldest queued item to make room. For live sources where
    /// the newest frame matters most.
    DropOldest,
    /// Discard the incoming item. For live sources where in-flight work
    /// should finish undisturbed.
    DropNewest,
}

/// Depth and overflow policy for one stage queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub depth: usize,
    pub policy: OverflowPolicy,
}

impl QueueConfig {
    pub fn blocking(depth: usize) -> Self {
        Self {
            depth,
            policy: OverflowPolicy::Block,
        }
    }

    pub fn drop_oldest(depth: usize) -> Self {
        Self {
            depth,
            policy: OverflowPolicy::DropOldest,
        }
    }

    pub fn drop_newest(depth: usize) -> Self {
        Self {
            depth,
            policy: OverflowPolicy::DropNewest,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::blocking(4)
    }
}

/// Producer handle of a stage queue.
pub struct StageSender<T> {
    tx: crossbeam_channel::Sender<T>,
    /// Same queue as the consumer's receiver, used to evict under
    /// DropOldest. Held ONLY for that policy: an extra receiver keeps the
    /// channel from disconnecting when the consumer goes away, which must
    /// never stall a blocking send.
    mirror: Option<Receiver<T>>,
    policy: OverflowPolicy,
    stage: &'static str,
    metrics: Arc<PipelineMetrics>,
}

/// Create a bounded stage queue. Drops are counted in
/// `metrics.frames_dropped`.
pub fn stage_queue<T>(
    stage: &'static str,
    config: &QueueConfig,
    metrics: Arc<PipelineMetrics>,
) -> (StageSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(config.depth);
    let mirror = matches!(config.policy, OverflowPolicy::DropOldest).then(|| rx.clone());
    (
        StageSender {
            tx,
            mirror,
            policy: config.policy,
            stage,
            metrics,
        },
        rx,
    )
}

impl<T> StageSender<T> {
    /// Hand an item to the consumer per the configured overflow policy.
    ///
    /// Only a hung-up consumer is an error; a counted drop is not.
    pub fn send(&self, item: T) -> Result<(), PipelineError> {
        match self.policy {
            OverflowPolicy::Block => self
                .tx
                .send(item)
                .map_err(|_| PipelineError::StageDisconnected { stage: self.stage }),
            OverflowPolicy::DropNewest => match self.tx.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    debug!("queue `{}` full, dropping newest", self.stage);
                    self.count_drop();
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => {
                    Err(PipelineError::StageDisconnected { stage: self.stage })
                }
            },
            OverflowPolicy::DropOldest => {
                let mut item = item;
                loop {
                    match self.tx.try_send(item) {
                        Ok(()) => return Ok(()),
                        Err(TrySendError::Full(rejected)) => {
                            debug!("queue `{}` full, evicting oldest", self.stage);
                            if let Some(mirror) = &self.mirror {
                                let _ = mirror.try_recv();
                            }
                            self.count_drop();
                            item = rejected;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(PipelineError::StageDisconnected { stage: self.stage });
                        }
                    }
                }
            }
        }
    }

    fn count_drop(&self) {
        self.metrics
            .frames_dropped
            .fetch_add(1, Ordering::Relaxed);
    }
}
