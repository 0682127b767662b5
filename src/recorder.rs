use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;
use metrics::Key;

use crate::MetricRegistry;
use crate::types::{Gauge, GaugeCell};

static RECORDER: OnceLock<Recorder> = OnceLock::new();

/// Routes the `metrics` facade macros into a [`MetricRegistry`].
///
/// - `counter!` increments the registry counter of the same name
/// - `gauge!` sets a value cell that the registry reads as a gauge
/// - `histogram!` records a timing sample, in milliseconds
///
/// Labelled keys map to `name{label="value",...}`.
#[derive(Debug)]
pub struct Recorder {
    registry: Arc<MetricRegistry>,
    gauges: DashMap<Key, Arc<GaugeCell>>,
}

impl Recorder {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            gauges: DashMap::new(),
        }
    }

    /// Installs the process-wide recorder over a fresh registry.
    pub fn init() -> Result<&'static Self, metrics::SetRecorderError<&'static Self>> {
        let recorder = RECORDER.get_or_init(|| Self::new(Arc::new(MetricRegistry::new())));

        metrics::set_global_recorder(recorder).map(|_| recorder)
    }

    /// The recorder installed by [`Recorder::init`], if any.
    pub fn current() -> Option<&'static Self> {
        RECORDER.get()
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }
}

impl metrics::Recorder for Recorder {
    fn describe_counter(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
        //
    }

    fn describe_gauge(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
        //
    }

    fn describe_histogram(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
        //
    }

    fn register_counter(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> metrics::Counter {
        let counter = self.registry.counter(&crate::key::to_name(key));

        metrics::Counter::from_arc(counter)
    }

    fn register_gauge(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> metrics::Gauge {
        let gauge = self
            .gauges
            .entry(key.clone())
            .or_insert_with(|| Arc::new(GaugeCell::default()))
            .value()
            .clone();

        // The registry gauge may have been deleted since the cell was made.
        let reader = gauge.clone();
        self.registry
            .add_gauge_if_absent(&crate::key::to_name(key), || {
                Gauge::new(move || reader.get())
            });

        metrics::Gauge::from_arc(gauge)
    }

    fn register_histogram(
        &self,
        key: &Key,
        _metadata: &metrics::Metadata<'_>,
    ) -> metrics::Histogram {
        let metric = self.registry.get_metric(&crate::key::to_name(key));

        metrics::Histogram::from_arc(metric)
    }
}
