use std::ops::Deref;

use crate::error::{MetricsError, Result};

/// Upper boundaries of the finite buckets, in milliseconds.
///
/// The table grows roughly by 30% per step, covering 1 ms up to ~18 minutes.
/// Anything beyond the last boundary lands in the overflow bucket.
pub const BUCKET_OFFSETS: [i64; 52] = [
    1, 2, 3, 4, 5, 7, 9, 11, 14, 18, 24, 31, 40, 52, 67, 87, 113, 147, 191, 248, 322, 418, 543,
    706, 918, 1193, 1551, 2016, 2620, 3406, 4428, 5757, 7483, 9728, 12647, 16441, 21373, 27784,
    36119, 46955, 61041, 79354, 103160, 134107, 174339, 226641, 294633, 383023, 497930, 647308,
    841501, 1093951,
];

/// Number of buckets, finite ones plus the overflow bucket.
pub const BUCKET_COUNT: usize = BUCKET_OFFSETS.len() + 1;

/// Index of the overflow bucket.
pub const OVERFLOW_BUCKET: usize = BUCKET_OFFSETS.len();

/// Returned by [`Histogram::percentile`] when the requested rank falls in the
/// overflow bucket. Callers should read it as "unbounded", not as a failure.
pub const OFF_SCALE: i64 = i64::MAX;

/// Maps a sample to its bucket.
///
/// A value equal to a boundary goes one bucket past it, so bucket `i` holds
/// `BUCKET_OFFSETS[i - 1] ..= BUCKET_OFFSETS[i] - 1`. Bucket 0 holds every
/// value below 1, negatives included.
///
/// ```rust
/// use loka_stats::types::bucket_index;
///
/// assert_eq!(bucket_index(0), 0);
/// assert_eq!(bucket_index(1), 1);
/// assert_eq!(bucket_index(11), 8);
/// assert_eq!(bucket_index(13), 8);
/// assert_eq!(bucket_index(9_999_999), 52);
/// ```
pub fn bucket_index(value: i64) -> usize {
    BUCKET_OFFSETS.partition_point(|&offset| offset <= value)
}

/// A fixed exponential histogram of integer samples.
///
/// ## Overview
///
/// Samples are classified into [`BUCKET_COUNT`] buckets by a binary search
/// over [`BUCKET_OFFSETS`]. Only bucket counts are kept, so memory is constant
/// and two histograms can be merged by adding their buckets.
///
/// The histogram itself is not synchronized. [`RunningMetric`] wraps one in
/// its per-instance lock; snapshots hand out an [`ImmutableHistogram`].
///
/// ## Invariant
///
/// The sum of all buckets always equals [`total`](Histogram::total).
///
/// ## Example
///
/// ```rust
/// use loka_stats::Histogram;
///
/// let mut histogram = Histogram::new();
/// for value in [5, 10, 15, 20] {
///     histogram.add(value);
/// }
///
/// assert_eq!(histogram.total(), 4);
/// assert_eq!(histogram.percentile(0.5), 10);
/// assert_eq!(histogram.percentile(0.9), 23);
/// ```
///
/// [`RunningMetric`]: crate::RunningMetric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    buckets: [u64; BUCKET_COUNT],
    total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            buckets: [0; BUCKET_COUNT],
            total: 0,
        }
    }

    /// Classifies `value` and counts it in exactly one bucket.
    pub fn add(&mut self, value: i64) {
        self.add_to_bucket(bucket_index(value));
    }

    /// Counts one sample directly in bucket `index`.
    ///
    /// Out-of-range indices are folded into the overflow bucket.
    pub fn add_to_bucket(&mut self, index: usize) {
        let index = index.min(OVERFLOW_BUCKET);
        self.buckets[index] += 1;
        self.total += 1;
    }

    /// Zeroes every bucket, the overflow bucket included.
    pub fn clear(&mut self) {
        self.buckets = [0; BUCKET_COUNT];
        self.total = 0;
    }

    /// Adds `other` bucket-wise, combining two accumulation windows.
    ///
    /// Accepts an [`ImmutableHistogram`] as well through deref.
    pub fn merge(&mut self, other: &Histogram) {
        for (bucket, count) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *bucket += count;
        }
        self.total += other.total;
    }

    /// Copies the bucket counts out.
    pub fn get(&self) -> [u64; BUCKET_COUNT] {
        self.buckets
    }

    /// Copies the bucket counts out and clears the histogram.
    pub fn get_and_reset(&mut self) -> [u64; BUCKET_COUNT] {
        let buckets = self.buckets;
        self.clear();
        buckets
    }

    pub fn buckets(&self) -> &[u64; BUCKET_COUNT] {
        &self.buckets
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Returns the sample value at rank `percentile` (0.0 to 1.0).
    ///
    /// ## Algorithm
    ///
    /// Buckets are walked in order, accumulating counts until the running sum
    /// reaches `percentile * total`. The answer is the largest value the last
    /// consumed bucket can hold, i.e. its boundary minus one, so that feeding
    /// the answer back through [`bucket_index`] lands in that same bucket.
    ///
    /// ## Edge Cases
    ///
    /// - **`percentile == 0.0` or empty histogram**: returns 0
    /// - **Rank in the overflow bucket**: returns [`OFF_SCALE`]
    /// - **`percentile > 1.0`**: the walk exhausts every bucket and returns
    ///   [`OFF_SCALE`]
    pub fn percentile(&self, percentile: f64) -> i64 {
        let threshold = percentile * self.total as f64;
        let mut sum = 0u64;
        let mut index = 0usize;

        while (sum as f64) < threshold && index < BUCKET_COUNT {
            sum += self.buckets[index];
            index += 1;
        }

        if index == 0 {
            return 0;
        }

        match BUCKET_OFFSETS.get(index - 1) {
            Some(offset) => offset - 1,
            None => OFF_SCALE,
        }
    }

    /// Freezes a copy of the current counts.
    pub fn immutable_copy(&self) -> ImmutableHistogram {
        ImmutableHistogram {
            inner: self.clone(),
        }
    }
}

/// A read-only histogram, as carried by metric snapshots.
///
/// It derefs to [`Histogram`] for every query but exposes no mutator, so any
/// attempt to add, clear or merge into it is rejected by the compiler. Use
/// [`to_mutable`](ImmutableHistogram::to_mutable) to start a new window from
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImmutableHistogram {
    inner: Histogram,
}

impl ImmutableHistogram {
    /// Restores a histogram from exported bucket counts.
    pub fn from_buckets(buckets: Vec<u64>) -> Result<Self> {
        let actual = buckets.len();
        let buckets: [u64; BUCKET_COUNT] =
            buckets
                .try_into()
                .map_err(|_| MetricsError::BucketCount {
                    expected: BUCKET_COUNT,
                    actual,
                })?;
        let total = buckets.iter().sum();

        Ok(Self {
            inner: Histogram { buckets, total },
        })
    }

    pub fn to_mutable(&self) -> Histogram {
        self.inner.clone()
    }
}

impl Deref for ImmutableHistogram {
    type Target = Histogram;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<Histogram> for ImmutableHistogram {
    fn as_ref(&self) -> &Histogram {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_table_is_ascending() {
        assert_eq!(BUCKET_COUNT, 53);
        assert!(BUCKET_OFFSETS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_bucket_index_is_monotonic() {
        let mut previous = 0;
        for value in 0..1_200_000 {
            let index = bucket_index(value);
            assert!(index >= previous, "bucket index dropped at {value}");
            previous = index;
        }
        assert_eq!(previous, OVERFLOW_BUCKET);
    }

    #[test]
    fn test_boundary_goes_one_bucket_up() {
        for (i, &offset) in BUCKET_OFFSETS.iter().enumerate() {
            assert_eq!(bucket_index(offset), i + 1);
            assert_eq!(bucket_index(offset - 1), i);
        }
    }

    #[test]
    fn test_negative_values_use_first_bucket() {
        let mut histogram = Histogram::new();
        histogram.add(-5);
        histogram.add(i64::MIN);
        assert_eq!(histogram.get()[0], 2);
    }

    #[test]
    fn test_add_to_bucket_clamps_to_overflow() {
        let mut histogram = Histogram::new();
        histogram.add_to_bucket(500);
        assert_eq!(histogram.get()[OVERFLOW_BUCKET], 1);
        assert_eq!(histogram.total(), 1);
    }

    #[test]
    fn test_clear_zeroes_overflow_bucket() {
        let mut histogram = Histogram::new();
        histogram.add(100_000_000);
        histogram.add(3);
        histogram.clear();
        assert!(histogram.get().iter().all(|&count| count == 0));
        assert_eq!(histogram.total(), 0);
    }

    #[test]
    fn test_percentile_of_empty_histogram() {
        let histogram = Histogram::new();
        assert_eq!(histogram.percentile(0.0), 0);
        assert_eq!(histogram.percentile(0.5), 0);
        assert_eq!(histogram.percentile(1.0), 0);
    }

    #[test]
    fn test_percentile_beyond_one_is_off_scale() {
        let mut histogram = Histogram::new();
        histogram.add(10);
        assert_eq!(histogram.percentile(1.5), OFF_SCALE);
    }

    #[test]
    fn test_immutable_copy_is_detached() {
        let mut histogram = Histogram::new();
        histogram.add(7);
        let frozen = histogram.immutable_copy();
        histogram.add(7);

        assert_eq!(frozen.total(), 1);
        assert_eq!(histogram.total(), 2);
    }

    #[test]
    fn test_from_buckets_rejects_wrong_length() {
        let err = ImmutableHistogram::from_buckets(vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::BucketCount {
                expected: 53,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_from_buckets_recomputes_total() {
        let mut buckets = vec![0; BUCKET_COUNT];
        buckets[3] = 4;
        buckets[OVERFLOW_BUCKET] = 1;
        let histogram = ImmutableHistogram::from_buckets(buckets).unwrap();
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.percentile(1.0), OFF_SCALE);
    }
}
