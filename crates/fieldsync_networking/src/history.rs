//! # Sample History
//!
//! Timestamped receive history for blended fields.
//!
//! The network side pushes samples as they arrive; the blending side
//! copies them out. The mutex guards one push, prune or copy at a time
//! and is never held across decoding or interpolation.

use std::collections::VecDeque;

use fieldsync_shared::Ticks;
use parking_lot::Mutex;

use crate::value::SyncValue;

/// Samples kept per update interval covered by the interpolation lead.
const SAMPLES_PER_LEAD_INTERVAL: f64 = 2.5;

/// Slack absorbing `f32` representation error before rounding up.
const CAPACITY_EPSILON: f64 = 1e-4;

/// History capacity for a field sampled every `interval_seconds`.
///
/// `max(minimum, ceil(lead / interval * 2.5))`, or just `minimum` for
/// end-of-tick fields.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn history_capacity(lead_seconds: f32, interval_seconds: f32, minimum: usize) -> usize {
    if interval_seconds <= 0.0 || lead_seconds <= 0.0 {
        return minimum.max(1);
    }
    let needed = f64::from(lead_seconds) / f64::from(interval_seconds) * SAMPLES_PER_LEAD_INTERVAL;
    let needed = (needed - CAPACITY_EPSILON).ceil().max(0.0) as usize;
    minimum.max(needed).max(1)
}

/// One received value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistorySample {
    /// Receive time.
    pub timestamp: Ticks,
    /// Received value.
    pub value: SyncValue,
}

/// Fixed-capacity, time-ordered ring of received samples.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<HistorySample>>,
}

impl HistoryBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of samples.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Returns true if no sample is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Inserts a sample at its time position, evicting the oldest when full.
    ///
    /// A sample older than everything in a full buffer is dropped.
    pub fn push(&self, timestamp: Ticks, value: SyncValue) {
        let mut samples = self.samples.lock();
        let position = samples.partition_point(|s| s.timestamp <= timestamp);
        if samples.len() == self.capacity {
            if position == 0 {
                return;
            }
            samples.pop_front();
            samples.insert(position - 1, HistorySample { timestamp, value });
        } else {
            samples.insert(position, HistorySample { timestamp, value });
        }
    }

    /// Newest sample.
    #[must_use]
    pub fn latest(&self) -> Option<HistorySample> {
        self.samples.lock().back().copied()
    }

    /// Oldest sample.
    #[must_use]
    pub fn oldest(&self) -> Option<HistorySample> {
        self.samples.lock().front().copied()
    }

    /// Copies all samples, oldest first, into `out` (cleared first).
    pub fn copy_into(&self, out: &mut Vec<HistorySample>) {
        out.clear();
        out.extend(self.samples.lock().iter().copied());
    }

    /// Drops samples older than `timestamp`, keeping the newest one at or
    /// before it so the interval containing `timestamp` stays bracketed.
    ///
    /// Returns the number of samples removed.
    pub fn prune_before(&self, timestamp: Ticks) -> usize {
        let mut samples = self.samples.lock();
        let at_or_before = samples.partition_point(|s| s.timestamp <= timestamp);
        let remove = at_or_before.saturating_sub(1);
        samples.drain(..remove);
        remove
    }

    /// Removes every sample.
    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Empties the buffer and resizes it for reuse by another field.
    pub fn reset(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        let samples = self.samples.get_mut();
        samples.clear();
        if samples.capacity() < capacity {
            samples.reserve_exact(capacity);
        }
        self.capacity = capacity;
    }
}
