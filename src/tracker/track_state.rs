/// Lifecycle status of a tracklet.
///
/// `New -> Tracked -> ... -> Lost -> (purged)`. `New` is reported exactly
/// once, in the aligned result for the frame that created the tracklet.
/// `Lost` is terminal: it is reported exactly once and the tracklet is
/// purged immediately after that emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackStatus {
    /// Created on this detection cycle, not yet reported
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// No longer trackable, reported once and then purged
    Lost,
}
