//! Tracklet id assignment policies.

use std::collections::BTreeSet;

/// How ids are handed to newly created tracklets.
///
/// The choice is observable to consumers: under `SmallestAvailable` an id
/// freed by a purged tracklet is handed out again, under `UniqueMonotonic`
/// ids strictly increase for the lifetime of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Reuse the lowest id (numbered from 1) not held by any live tracklet.
    #[default]
    SmallestAvailable,
    /// Never reuse: strictly increasing ids, numbered from 0.
    UniqueMonotonic,
}

/// Id source for a single tracker instance.
///
/// Owned by the tracker so that id assignment shares the tracker's
/// single-writer discipline; there is no process-global counter.
#[derive(Debug)]
pub struct IdAssigner {
    policy: IdPolicy,
    next: u64,
}

impl IdAssigner {
    pub fn new(policy: IdPolicy) -> Self {
        Self { policy, next: 0 }
    }

    /// Hand out the next id given the set of ids currently held by live
    /// tracklets.
    pub fn assign(&mut self, live: &BTreeSet<u64>) -> u64 {
        match self.policy {
            IdPolicy::SmallestAvailable => {
                let mut id = 1;
                while live.contains(&id) {
                    id += 1;
                }
                id
            }
            IdPolicy::UniqueMonotonic => {
                let id = self.next;
                self.next += 1;
                id
            }
        }
    }
}
