use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::ConsumerView;
use crate::export::StatsSummary;
use crate::types::{AtomicCounter, Gauge, GaugeSource, MetricSnapshot, RunningMetric};

/// Names are case-insensitive; everything is stored lower-cased.
pub(crate) fn normalize(name: &str) -> Cow<'_, str> {
    if name.chars().any(char::is_uppercase) {
        Cow::Owned(name.to_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// The private metric copies of one attached consumer.
#[derive(Debug, Default)]
pub(crate) struct Listener {
    metrics: DashMap<String, Arc<RunningMetric>>,
}

impl Listener {
    pub(crate) fn metric(&self, name: &str) -> Arc<RunningMetric> {
        if let Some(metric) = self.metrics.get(name) {
            return metric.value().clone();
        }

        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RunningMetric::new()))
            .value()
            .clone()
    }

    pub(crate) fn metrics(&self) -> Vec<(String, Arc<RunningMetric>)> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn get(&self, name: &str) -> Option<Arc<RunningMetric>> {
        self.metrics.get(name).map(|entry| entry.value().clone())
    }
}

/// The shared source of truth for counters, gauges and timing metrics.
///
/// Every lookup by name is get-or-create, so instrumentation call sites never
/// deal with missing entries. Concurrent first touches of the same name race
/// through `DashMap::entry` to a single winner.
///
/// Consumers attach through [`MetricRegistry::attach`]; each receives its own
/// copy of every metric, fed synchronously by the primary.
///
/// ```rust
/// use std::sync::Arc;
/// use loka_stats::MetricRegistry;
///
/// let registry = Arc::new(MetricRegistry::new());
/// let view = registry.attach();
///
/// registry.increment("requests", 3);
/// registry.record_metric("latency", 12.0);
///
/// assert_eq!(view.get_counters()["requests"], 3);
/// assert_eq!(view.get_metrics()["latency"].count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MetricRegistry {
    counters: DashMap<String, Arc<AtomicCounter>>,
    metrics: DashMap<String, Arc<RunningMetric>>,
    gauges: DashMap<String, Gauge>,
    listeners: Mutex<Vec<Arc<Listener>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`ConsumerView`] attached to this registry.
    pub fn attach(self: &Arc<Self>) -> ConsumerView {
        ConsumerView::new(self.clone())
    }

    /// Returns the counter `name`, creating it at zero.
    pub fn counter(&self, name: &str) -> Arc<AtomicCounter> {
        let name = normalize(name);
        if let Some(counter) = self.counters.get(name.as_ref()) {
            return counter.value().clone();
        }

        self.counters
            .entry(name.into_owned())
            .or_insert_with(|| Arc::new(AtomicCounter::default()))
            .value()
            .clone()
    }

    /// Adds `n` to the counter `name` and returns its new value.
    pub fn increment(&self, name: &str, n: i64) -> i64 {
        self.counter(name).increment(n)
    }

    pub fn incr(&self, name: &str) -> i64 {
        self.increment(name, 1)
    }

    /// Adds `n` to each counter; returns the value of the last one.
    pub fn increment_all(&self, names: &[&str], n: i64) -> i64 {
        names
            .iter()
            .fold(0, |_, name| self.increment(name, n))
    }

    pub fn delete_counter(&self, name: &str) -> Option<i64> {
        self.counters
            .remove(normalize(name).as_ref())
            .map(|(_, counter)| counter.value())
    }

    /// Returns the metric `name`, creating it if needed.
    ///
    /// A new metric is fanned out to every attached listener before it is
    /// published in the map, and both happen under the listener lock, so a
    /// listener attaching concurrently either sees the metric in the map or
    /// is already in its fan-out.
    pub fn get_metric(&self, name: &str) -> Arc<RunningMetric> {
        let name = normalize(name);
        if let Some(metric) = self.metrics.get(name.as_ref()) {
            return metric.value().clone();
        }

        let listeners = self.listeners.lock();
        let key = name.into_owned();
        let metric = Arc::new(RunningMetric::new());
        self.metrics
            .entry(key.clone())
            .or_insert_with(|| {
                for listener in listeners.iter() {
                    metric.add_fanout(listener.metric(&key));
                }
                metric.clone()
            })
            .value()
            .clone()
    }

    /// Records one timing sample, in milliseconds.
    pub fn record_metric(&self, name: &str, value: f64) {
        self.get_metric(name).add(value);
    }

    /// Records `elapsed` with whole-millisecond resolution.
    pub fn record_duration(&self, name: &str, elapsed: Duration) {
        self.record_metric(name, elapsed.as_millis() as f64);
    }

    /// Runs `action` and records how long it took under `name`.
    pub fn time<T>(&self, name: &str, action: impl FnOnce() -> T) -> T {
        self.time_all(&[name], action)
    }

    pub fn time_all<T>(&self, names: &[&str], action: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let answer = action();
        let elapsed = start.elapsed();
        for name in names {
            self.record_duration(name, elapsed);
        }
        answer
    }

    pub fn delete_time(&self, name: &str) -> Option<Arc<RunningMetric>> {
        self.metrics
            .remove(normalize(name).as_ref())
            .map(|(_, metric)| metric)
    }

    /// Registers (or replaces) the gauge `name`.
    pub fn add_gauge<F>(&self, name: &str, producer: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.gauges
            .insert(normalize(name).into_owned(), Gauge::new(producer));
    }

    /// Registers `producer` unless a gauge named `name` already exists.
    pub(crate) fn add_gauge_if_absent<F>(&self, name: &str, producer: F)
    where
        F: FnOnce() -> Gauge,
    {
        self.gauges
            .entry(normalize(name).into_owned())
            .or_insert_with(producer);
    }

    /// Registers an externally provided gauge under its own name.
    pub fn add_gauge_source(&self, source: Arc<dyn GaugeSource>) {
        let name = normalize(source.name()).into_owned();
        self.gauges.insert(name, Gauge::from_source(source));
    }

    pub fn delete_gauge(&self, name: &str) -> Option<Gauge> {
        self.gauges
            .remove(normalize(name).as_ref())
            .map(|(_, gauge)| gauge)
    }

    /// Reads the gauge `name` now, if registered.
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        // Clone out first: the producer must not run under a shard lock.
        let gauge = self
            .gauges
            .get(normalize(name).as_ref())
            .map(|entry| entry.value().clone())?;
        Some(gauge.value())
    }

    /// Registers a listener and fans every existing metric out into it.
    pub(crate) fn add_listener(&self, listener: &Arc<Listener>) {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|l| Arc::ptr_eq(l, listener)) {
            return;
        }
        listeners.push(listener.clone());

        for entry in self.metrics.iter() {
            entry.value().add_fanout(listener.metric(entry.key()));
        }

        debug!(
            listeners = listeners.len(),
            metrics = self.metrics.len(),
            "Attached stats listener"
        );
    }

    pub(crate) fn remove_listener(&self, listener: &Arc<Listener>) {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        if listeners.len() == before {
            return;
        }

        for entry in self.metrics.iter() {
            if let Some(copy) = listener.get(entry.key()) {
                entry.value().remove_fanout(&copy);
            }
        }

        debug!(listeners = listeners.len(), "Detached stats listener");
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn counter_handles(&self) -> Vec<(String, Arc<AtomicCounter>)> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Current value of every counter.
    pub fn counters(&self) -> BTreeMap<String, i64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value()))
            .collect()
    }

    /// Reads every gauge once.
    pub fn gauges(&self) -> BTreeMap<String, f64> {
        let gauges: Vec<(String, Gauge)> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        gauges
            .into_iter()
            .map(|(name, gauge)| (name, gauge.value()))
            .collect()
    }

    /// Cumulative snapshot of every metric; nothing is reset.
    pub fn metrics(&self) -> BTreeMap<String, MetricSnapshot> {
        let metrics: Vec<(String, Arc<RunningMetric>)> = self
            .metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        metrics
            .into_iter()
            .map(|(name, metric)| (name, metric.snapshot()))
            .collect()
    }

    /// Cumulative export of the whole registry.
    pub fn summary(&self) -> StatsSummary {
        let counters = self.counters();
        StatsSummary::new(counters, self.gauges(), &self.metrics())
    }

    /// Drops every counter, gauge, metric and listener.
    ///
    /// Meant for test isolation; concurrent writers may recreate entries
    /// while this runs.
    pub fn clear_all(&self) {
        self.counters.clear();
        self.gauges.clear();
        self.metrics.clear();
        self.listeners.lock().clear();
    }
}
