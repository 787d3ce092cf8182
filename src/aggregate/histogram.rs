use std::sync::atomic::{AtomicU64, Ordering};

/// Number of 1ms buckets, covering `[0, 999]` ms.
pub const BUCKET_COUNT: usize = 1000;
/// Latencies at or above this land in the overflow bucket, and any percentile that
/// falls into the overflow bucket is reported as this value.
pub const MAX_TRACKABLE_MS: u64 = 1000;

/// Fixed-resolution latency distribution with O(1) recording.
///
/// One atomic counter per millisecond from 0 to 999 plus one overflow bucket.
/// Recording never takes a lock: the bucket, count and sum are plain atomic adds
/// and min/max are CAS loops, so thousands of concurrent writers only ever contend
/// on cache lines, never on a mutex.
///
/// # Memory vs accuracy
/// Memory and query cost are bounded (1001 counters, one linear scan), at the price
/// of the extreme tail: everything from one second upwards is a single bucket.
/// That is fine for sub-second SLAs; for slower targets read `max()` as well.
pub struct LatencyHistogram {
    buckets: Box<[AtomicU64]>,
    overflow: AtomicU64,
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| AtomicU64::new(0)).collect(),
            overflow: AtomicU64::new(0),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    pub fn record(&self, latency_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(latency_ms, Ordering::Relaxed);
        update_min(&self.min, latency_ms);
        update_max(&self.max, latency_ms);

        if latency_ms >= MAX_TRACKABLE_MS {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buckets[latency_ms as usize].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Latency below which `percentile` percent of the recorded samples fall.
    ///
    /// Scans buckets upwards until the cumulative count reaches
    /// `ceil(count * percentile / 100)`. Returns 0 when nothing was recorded and
    /// [`MAX_TRACKABLE_MS`] when the target lies in the overflow bucket.
    /// Non-decreasing in `percentile`.
    pub fn percentile(&self, percentile: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }

        let target = (count as f64 * percentile / 100.0).ceil() as u64;
        let mut cumulative = 0;
        for (latency, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return latency as u64;
            }
        }
        MAX_TRACKABLE_MS
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// 0 when empty.
    pub fn min(&self) -> u64 {
        match self.min.load(Ordering::Relaxed) {
            u64::MAX => 0,
            min => min,
        }
    }

    /// 0 when empty.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Must not race with `record`; intended for reuse between runs.
    pub fn reset(&self) {
        self.buckets
            .iter()
            .for_each(|bucket| bucket.store(0, Ordering::Relaxed));
        self.overflow.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
        self.min.store(u64::MAX, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
    }
}

pub(crate) fn update_min(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value < current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

pub(crate) fn update_max(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value > current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}
