//! Generic timestamp wrapper.

use serde::{Deserialize, Serialize};

/// A value tagged with the time it was measured.
///
/// Timestamps are microseconds since epoch, matching the sensor messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    pub timestamp_us: u64,
}

impl<T> Timestamped<T> {
    #[inline]
    pub fn new(data: T, timestamp_us: u64) -> Self {
        Self { data, timestamp_us }
    }

    /// Map the inner data while preserving timestamp.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Timestamped<U> {
        Timestamped {
            data: f(self.data),
            timestamp_us: self.timestamp_us,
        }
    }
}
