//! Hour-long rolling time series sampled from a [`ConsumerView`].
//!
//! Every tick appends one slot per key into a fixed 60-slot ring buffer:
//!
//! - `counter:<name>`: events since the previous tick
//! - `gauge:<name>`: the gauge value at tick time
//! - `timing:<name>`: the [`QUANTILES`] of samples since the previous tick
//!
//! Ticks are driven by a tokio task (feature `collector`) or by calling
//! [`TimeSeriesRoller::roll`] directly.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::ConsumerView;
use crate::clock::Clock;
use crate::error::{MetricsError, Result};
use crate::types::QUANTILES;

/// Slots per series: one hour at one-minute resolution.
pub const WINDOW: usize = 60;

const SLOT_SECONDS: i64 = 60;

/// Configuration for the periodic roller task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollerConfig {
    /// Time between two rolls (default: 60s)
    pub period: Duration,
    /// Delay before the first roll (default: 10s)
    pub initial_delay: Duration,
}

impl Default for RollerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            initial_delay: Duration::from_secs(10),
        }
    }
}

impl RollerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(MetricsError::ZeroPeriod {
                period: self.period,
            });
        }
        Ok(())
    }
}

/// Fixed-length ring buffer, read oldest-first.
#[derive(Debug, Clone)]
struct TimeSeries<T> {
    data: Vec<T>,
    index: usize,
}

impl<T: Clone> TimeSeries<T> {
    /// A full window of `empty` slots with `initial` as the newest one.
    fn hourly(empty: T, initial: T) -> Self {
        let mut series = Self {
            data: vec![empty; WINDOW],
            index: 0,
        };
        series.add(initial);
        series
    }

    fn add(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % self.data.len();
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.data[self.index..]
            .iter()
            .chain(self.data[..self.index].iter())
    }
}

fn push<T: Clone>(series: &mut HashMap<String, TimeSeries<T>>, key: String, empty: T, value: T) {
    match series.entry(key) {
        Entry::Occupied(mut entry) => entry.get_mut().add(value),
        Entry::Vacant(entry) => {
            entry.insert(TimeSeries::hourly(empty, value));
        }
    }
}

#[derive(Debug)]
struct RollerState {
    hourly: HashMap<String, TimeSeries<f64>>,
    timings: HashMap<String, TimeSeries<Vec<i64>>>,
    last: DateTime<Utc>,
}

#[derive(Debug)]
struct RollerInner {
    view: ConsumerView,
    clock: Arc<dyn Clock>,
    state: Mutex<RollerState>,
}

impl RollerInner {
    fn roll(&self) -> bool {
        let Some(mut state) = self.state.try_lock() else {
            warn!("Previous stats roll still in progress, skipping this tick");
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| self.sample(&mut state))) {
            Ok(()) => true,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(reason = %reason, "Failed to roll stats, will retry next tick");
                false
            }
        }
    }

    fn sample(&self, state: &mut RollerState) {
        let counters = self.view.get_counters();
        let gauges = self.view.get_gauges();
        let metrics = self.view.get_metrics();

        for (name, delta) in &counters {
            push(&mut state.hourly, format!("counter:{name}"), 0.0, *delta as f64);
        }

        for (name, value) in &gauges {
            push(&mut state.hourly, format!("gauge:{name}"), 0.0, *value);
        }

        for (name, snapshot) in &metrics {
            push(
                &mut state.timings,
                format!("timing:{name}"),
                vec![0; QUANTILES.len()],
                snapshot.quantiles(),
            );
        }

        state.last = self.clock.now();

        debug!(
            counters = counters.len(),
            gauges = gauges.len(),
            timings = metrics.len(),
            "Rolled stats into time series"
        );
    }
}

/// Samples a [`ConsumerView`] into per-key hourly ring buffers.
///
/// ```rust
/// use std::sync::Arc;
/// use loka_stats::{MetricRegistry, RollerConfig, TimeSeriesRoller};
/// use loka_stats::clock::SystemClock;
///
/// let registry = Arc::new(MetricRegistry::new());
/// let roller = TimeSeriesRoller::new(registry.attach(), Arc::new(SystemClock), RollerConfig::default());
///
/// registry.increment("dogs", 3);
/// roller.roll();
///
/// let series = roller.get("counter:dogs", None).unwrap();
/// assert_eq!(series.len(), 60);
/// assert_eq!(series[59][1], 3);
/// ```
#[derive(Debug)]
pub struct TimeSeriesRoller {
    inner: Arc<RollerInner>,
    config: RollerConfig,
    #[cfg(feature = "collector")]
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TimeSeriesRoller {
    pub fn new(view: ConsumerView, clock: Arc<dyn Clock>, config: RollerConfig) -> Self {
        Self {
            inner: Arc::new(RollerInner {
                view,
                clock,
                state: Mutex::new(RollerState {
                    hourly: HashMap::new(),
                    timings: HashMap::new(),
                    last: DateTime::UNIX_EPOCH,
                }),
            }),
            config,
            #[cfg(feature = "collector")]
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RollerConfig {
        &self.config
    }

    /// Takes one sample now.
    ///
    /// Returns `false` when the tick was skipped because another one was in
    /// flight, or when sampling failed (the failure is logged).
    pub fn roll(&self) -> bool {
        self.inner.roll()
    }

    /// Returns 60 rows, oldest first, of `[unix_seconds, value...]`.
    ///
    /// `selection` picks quantile columns by index for `timing:` keys and is
    /// ignored for scalar keys. Unknown keys yield `None`.
    pub fn get(&self, key: &str, selection: Option<&[usize]>) -> Option<Vec<Vec<i64>>> {
        let state = self.inner.state.lock();
        let last = state.last.timestamp();
        let times = (0..WINDOW as i64).map(|i| last + (i - (WINDOW as i64 - 1)) * SLOT_SECONDS);

        if let Some(series) = state.hourly.get(key) {
            let rows = times
                .zip(series.iter())
                .map(|(time, value)| vec![time, value.round() as i64])
                .collect();
            return Some(rows);
        }

        let series = state.timings.get(key)?;
        let rows = times
            .zip(series.iter())
            .map(|(time, values)| {
                let mut row = Vec::with_capacity(values.len() + 1);
                row.push(time);
                row.extend(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| selection.is_none_or(|s| s.contains(i)))
                        .map(|(_, value)| *value),
                );
                row
            })
            .collect();
        Some(rows)
    }

    /// Every key seen so far, sorted.
    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut keys: Vec<String> = state
            .hourly
            .keys()
            .chain(state.timings.keys())
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(feature = "collector")]
impl TimeSeriesRoller {
    /// Spawns the periodic roll task on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(MetricsError::AlreadyRunning);
        }

        let inner = self.inner.clone();
        let RollerConfig {
            period,
            initial_delay,
        } = self.config.clone();

        *task = Some(runtime.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                // Sampling is synchronous: cancellation only lands between ticks.
                inner.roll();
            }
        }));

        tracing::info!(?period, ?initial_delay, "Started stats roller");
        Ok(())
    }

    /// Stops the periodic task. An in-flight roll finishes first.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!("Stopped stats roller");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[cfg(feature = "collector")]
impl Drop for TimeSeriesRoller {
    fn drop(&mut self) {
        self.stop();
    }
}
