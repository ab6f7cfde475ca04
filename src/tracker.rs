mod id_policy;
mod matching;
mod motion;
mod object_tracker;
mod rect;
mod track_state;
mod tracklet;

pub use id_policy::IdPolicy;
pub use matching::{AssociationStrategy, Detection, Signature};
pub use object_tracker::{AlignedResult, ObjectTracker, TrackerConfig};
pub use rect::{NormRect, Rect};
pub use track_state::TrackStatus;
pub use tracklet::{Tracklet, TrackletSnapshot};
