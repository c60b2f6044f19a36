//! Local write marker

/// Logical timestamp (Unix ms) of the newest state this device holds.
///
/// Local edits move it to `max(now, previous + 1)`, so a wall clock that
/// steps backwards still yields strictly increasing stamps on this device.
/// Applied remote snapshots move it to their own timestamp. It only ever
/// decreases through [`WriteMarker::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteMarker(i64);

impl WriteMarker {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Stamp a local edit made at wall-clock time `now`
    pub fn stamp(&mut self, now: i64) -> i64 {
        self.0 = now.max(self.0.saturating_add(1));
        self.0
    }

    /// Whether a snapshot stamped `logical_timestamp` is newer than local state
    #[must_use]
    pub const fn is_older_than(self, logical_timestamp: i64) -> bool {
        logical_timestamp > self.0
    }

    /// Adopt the timestamp of an applied remote snapshot
    pub fn observe_remote(&mut self, logical_timestamp: i64) {
        self.0 = self.0.max(logical_timestamp);
    }

    /// Forget local history, used when the signed-in account changes
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
