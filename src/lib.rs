//! # Loka Stats
//!
//! In-process counters, gauges and timing distributions, read by several
//! independent consumers at their own cadence.
//!
//! ## Overview
//!
//! Application threads update a shared [`MetricRegistry`]. Every consumer
//! (an HTTP exposer, the hourly [`TimeSeriesRoller`], a line-protocol sink)
//! attaches its own [`ConsumerView`] and gets:
//!
//! - **Counters** as deltas since that view's previous read, safe across
//!   `i64` wraparound
//! - **Timing metrics** as private copies fed by fan-out and reset on read,
//!   so one consumer's reset never hides samples from another
//! - **Gauges** read live from their producers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use loka_stats::MetricRegistry;
//!
//! let registry = Arc::new(MetricRegistry::new());
//! let exposer = registry.attach();
//!
//! registry.incr("requests");
//! registry.add_gauge("queue.depth", || 4.0);
//! let rows = registry.time("db.query", || vec![1, 2, 3]);
//! assert_eq!(rows.len(), 3);
//!
//! let summary = exposer.summary();
//! assert_eq!(summary.counters["requests"], 1);
//! assert_eq!(summary.gauges["queue.depth"], 4.0);
//! assert_eq!(summary.metrics["db.query"].count, 1);
//! ```
//!
//! ## Histograms
//!
//! Timings land in a fixed exponential histogram of 53 buckets (52 finite
//! boundaries from 1 to 1,093,951 plus overflow). Percentiles are answered
//! from bucket boundaries; a rank that falls in the overflow bucket is
//! reported as [`OFF_SCALE`].
//!
//! ```rust
//! use loka_stats::Histogram;
//!
//! let mut histogram = Histogram::new();
//! for value in [5, 10, 15, 20] {
//!     histogram.add(value);
//! }
//! assert_eq!(histogram.percentile(0.5), 10);
//! assert_eq!(histogram.percentile(0.75), 17);
//! ```
//!
//! ## `metrics` Facade
//!
//! [`Recorder`] installs a registry behind the `metrics` macros:
//!
//! ```rust
//! use loka_stats::Recorder;
//!
//! let recorder = Recorder::init().expect("Failed to initialize metrics recorder");
//!
//! metrics::counter!("app.requests.total").increment(1);
//! metrics::histogram!("app.response_time").record(45.0);
//!
//! assert_eq!(recorder.registry().counters()["app.requests.total"], 1);
//! ```
//!
//! ## Features
//!
//! - `collector` (default): background rolling through a tokio task,
//!   [`TimeSeriesRoller::start`] / [`TimeSeriesRoller::stop`]
//!
//! ## Examples
//!
//! - **`usage`**: a registry with two consumers and a time-series roller
//! - **`histogram_demo`**: bucket layout and percentile behaviour
//!
//! Run examples with: `cargo run --example <example_name>`

pub mod clock;
pub mod error;
pub mod export;
pub mod line_protocol;
pub mod types;

pub(crate) mod key;
pub(crate) mod recorder;
pub(crate) mod registry;
pub(crate) mod timeseries;
pub(crate) mod view;

pub use error::{MetricsError, Result};
pub use export::{MetricSummary, StatsSummary};
pub use recorder::Recorder;
pub use registry::MetricRegistry;
pub use timeseries::{RollerConfig, TimeSeriesRoller, WINDOW};
pub use types::{
    AtomicCounter, Gauge, GaugeSource, Histogram, ImmutableHistogram, MetricSnapshot, OFF_SCALE,
    RunningMetric,
};
pub use view::ConsumerView;
