use std::sync::Arc;

use parking_lot::Mutex;

use super::histogram::{Histogram, ImmutableHistogram};

/// Quantiles reported for timing distributions.
pub const QUANTILES: [f64; 8] = [0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 0.999, 0.9999];

/// Streaming count/min/max/mean with a Welford-style variance term.
///
/// `accumulated_variance` holds only the latest step, `delta * (x - mean)`,
/// not the running sum of squared deviations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Stats {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    accumulated_variance: f64,
}

impl Stats {
    fn record(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.mean = value;
            self.min = value;
            self.max = value;
            return;
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.accumulated_variance = delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn standard_deviation(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.accumulated_variance / self.count as f64).sqrt()
        }
    }
}

#[derive(Debug, Default)]
struct MetricState {
    stats: Stats,
    histogram: Histogram,
    fanout: Vec<Arc<RunningMetric>>,
}

/// A thread-safe timing distribution.
///
/// Every sample updates the running statistics and the backing [`Histogram`]
/// under one per-instance lock. Dependent metrics registered with
/// [`add_fanout`](RunningMetric::add_fanout) receive each sample inside that
/// same lock, so they are always exactly as current as this one.
///
/// ```rust
/// use loka_stats::RunningMetric;
///
/// let metric = RunningMetric::new();
/// metric.add(10.0);
/// metric.add(20.0);
///
/// assert_eq!(metric.count(), 2);
/// assert_eq!(metric.mean(), 15.0);
/// ```
#[derive(Debug, Default)]
pub struct RunningMetric {
    state: Mutex<MetricState>,
}

impl RunningMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sample, in milliseconds.
    ///
    /// Negative and NaN samples are dropped without error. The histogram
    /// receives the value truncated towards zero.
    pub fn add(&self, elapsed: f64) {
        if elapsed.is_nan() || elapsed < 0.0 {
            return;
        }

        let mut state = self.state.lock();
        for dependent in &state.fanout {
            dependent.add(elapsed);
        }
        state.stats.record(elapsed);
        state.histogram.add(elapsed as i64);
    }

    /// Registers `dependent` to receive every future sample.
    ///
    /// Registering the same metric twice, or a metric into itself, is a no-op.
    pub fn add_fanout(&self, dependent: Arc<RunningMetric>) {
        if std::ptr::eq(Arc::as_ptr(&dependent), self) {
            return;
        }

        let mut state = self.state.lock();
        if !state.fanout.iter().any(|f| Arc::ptr_eq(f, &dependent)) {
            state.fanout.push(dependent);
        }
    }

    pub fn remove_fanout(&self, dependent: &Arc<RunningMetric>) {
        self.state
            .lock()
            .fanout
            .retain(|f| !Arc::ptr_eq(f, dependent));
    }

    pub fn fanout_len(&self) -> usize {
        self.state.lock().fanout.len()
    }

    /// Resets statistics and histogram. Fan-out members are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.stats = Stats::default();
        state.histogram.clear();
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let state = self.state.lock();
        MetricSnapshot::capture(&state)
    }

    /// Takes a snapshot and clears, without letting a sample in between.
    pub fn snapshot_and_clear(&self) -> MetricSnapshot {
        let mut state = self.state.lock();
        let snapshot = MetricSnapshot::capture(&state);
        state.stats = Stats::default();
        state.histogram.clear();
        snapshot
    }

    pub fn count(&self) -> u64 {
        self.state.lock().stats.count
    }

    pub fn min(&self) -> f64 {
        self.state.lock().stats.min
    }

    pub fn max(&self) -> f64 {
        self.state.lock().stats.max
    }

    pub fn mean(&self) -> f64 {
        self.state.lock().stats.mean
    }

    pub fn standard_deviation(&self) -> f64 {
        self.state.lock().stats.standard_deviation()
    }

    pub fn histogram(&self) -> ImmutableHistogram {
        self.state.lock().histogram.immutable_copy()
    }

    pub fn percentiles(&self) -> Vec<(f64, i64)> {
        let state = self.state.lock();
        QUANTILES
            .iter()
            .map(|&q| (q, state.histogram.percentile(q)))
            .collect()
    }
}

impl metrics::HistogramFn for RunningMetric {
    fn record(&self, value: f64) {
        self.add(value);
    }
}

/// A frozen copy of a [`RunningMetric`].
///
/// Reads need no lock and there is no way to add to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    stats: Stats,
    histogram: ImmutableHistogram,
}

impl MetricSnapshot {
    fn capture(state: &MetricState) -> Self {
        Self {
            stats: state.stats,
            histogram: state.histogram.immutable_copy(),
        }
    }

    pub fn count(&self) -> u64 {
        self.stats.count
    }

    pub fn min(&self) -> f64 {
        self.stats.min
    }

    pub fn max(&self) -> f64 {
        self.stats.max
    }

    pub fn mean(&self) -> f64 {
        self.stats.mean
    }

    pub fn standard_deviation(&self) -> f64 {
        self.stats.standard_deviation()
    }

    pub fn histogram(&self) -> &ImmutableHistogram {
        &self.histogram
    }

    pub fn percentile(&self, percentile: f64) -> i64 {
        self.histogram.percentile(percentile)
    }

    /// The [`QUANTILES`] in order, as the roller stores them.
    pub fn quantiles(&self) -> Vec<i64> {
        QUANTILES
            .iter()
            .map(|&q| self.histogram.percentile(q))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_mean_max() {
        let metric = RunningMetric::new();
        metric.add(10.0);
        metric.add(20.0);

        assert_eq!(metric.count(), 2);
        assert_eq!(metric.min(), 10.0);
        assert_eq!(metric.max(), 20.0);
        assert_eq!(metric.mean(), 15.0);

        metric.add(60.0);

        assert_eq!(metric.count(), 3);
        assert_eq!(metric.min(), 10.0);
        assert_eq!(metric.max(), 60.0);
        assert_eq!(metric.mean(), 30.0);

        let mut expected = Histogram::new();
        expected.add(10);
        expected.add(20);
        expected.add(60);
        assert_eq!(metric.histogram().get(), expected.get());
    }

    #[test]
    fn test_empty_metric_is_zeroed() {
        let metric = RunningMetric::new();
        assert_eq!(metric.count(), 0);
        assert_eq!(metric.min(), 0.0);
        assert_eq!(metric.max(), 0.0);
        assert_eq!(metric.mean(), 0.0);
        assert_eq!(metric.standard_deviation(), 0.0);
    }

    #[test]
    fn test_single_zero_sample() {
        let metric = RunningMetric::new();
        metric.add(0.0);
        assert_eq!(metric.count(), 1);
        assert_eq!(metric.min(), 0.0);
        assert_eq!(metric.max(), 0.0);
        assert_eq!(metric.mean(), 0.0);
    }

    #[test]
    fn test_negative_and_nan_samples_are_dropped() {
        let metric = RunningMetric::new();
        metric.add(-1.0);
        metric.add(f64::NAN);
        assert_eq!(metric.count(), 0);
        assert_eq!(metric.histogram().total(), 0);
    }

    #[test]
    fn test_standard_deviation() {
        let metric = RunningMetric::new();
        metric.add(10.0);
        assert_eq!(metric.standard_deviation(), 0.0);

        metric.add(20.0);
        assert_eq!(metric.standard_deviation(), 5.0);

        metric.add(60.0);
        let expected = (1350.0f64 / 3.0).sqrt();
        assert!((metric.standard_deviation() - expected).abs() < 1e-9);
        assert!((metric.snapshot().standard_deviation() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_truncates_samples() {
        let metric = RunningMetric::new();
        metric.add(10.9);
        let histogram = metric.histogram();
        assert_eq!(histogram.get()[crate::types::bucket_index(10)], 1);
    }

    #[test]
    fn test_fanout_receives_every_sample() {
        let primary = RunningMetric::new();
        let dependent = Arc::new(RunningMetric::new());
        primary.add(1.0);
        primary.add_fanout(dependent.clone());
        primary.add(5.0);
        primary.add(7.0);

        assert_eq!(primary.count(), 3);
        assert_eq!(dependent.count(), 2);
        assert_eq!(dependent.mean(), 6.0);
    }

    #[test]
    fn test_fanout_is_deduplicated() {
        let primary = Arc::new(RunningMetric::new());
        let dependent = Arc::new(RunningMetric::new());
        primary.add_fanout(dependent.clone());
        primary.add_fanout(dependent.clone());
        primary.add_fanout(primary.clone());
        assert_eq!(primary.fanout_len(), 1);

        primary.remove_fanout(&dependent);
        primary.add(3.0);
        assert_eq!(primary.fanout_len(), 0);
        assert_eq!(dependent.count(), 0);
    }

    #[test]
    fn test_clear_keeps_fanout() {
        let primary = RunningMetric::new();
        let dependent = Arc::new(RunningMetric::new());
        primary.add_fanout(dependent.clone());
        primary.add(4.0);
        primary.clear();
        primary.add(8.0);

        assert_eq!(primary.count(), 1);
        assert_eq!(primary.min(), 8.0);
        assert_eq!(dependent.count(), 2);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let metric = RunningMetric::new();
        metric.add(3.0);
        let snapshot = metric.snapshot();
        metric.add(300.0);

        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.max(), 3.0);
        assert_eq!(snapshot.histogram().total(), 1);
        assert_eq!(metric.count(), 2);
    }

    #[test]
    fn test_snapshot_and_clear() {
        let metric = RunningMetric::new();
        metric.add(12.0);
        let snapshot = metric.snapshot_and_clear();
        assert_eq!(snapshot.count(), 1);
        assert_eq!(metric.count(), 0);
        assert_eq!(metric.histogram().total(), 0);
    }

    #[test]
    fn test_quantiles_profile() {
        let metric = RunningMetric::new();
        for value in [5.0, 10.0, 15.0, 20.0] {
            metric.add(value);
        }
        assert_eq!(metric.snapshot().quantiles(), vec![6, 10, 17, 23, 23, 23, 23, 23]);
        assert_eq!(metric.percentiles()[1], (0.5, 10));
    }
}
