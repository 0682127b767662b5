use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A named value producer registered from outside the engine.
///
/// Runtime or OS introspection (heap size, CPU time, cache ratios) plugs in
/// through this trait; the engine never reads such facilities itself.
pub trait GaugeSource: Send + Sync {
    fn name(&self) -> &str;

    fn read(&self) -> f64;
}

/// A gauge: a producer function invoked on every read.
#[derive(Clone)]
pub struct Gauge {
    producer: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    pub fn from_source(source: Arc<dyn GaugeSource>) -> Self {
        Self::new(move || source.read())
    }

    pub fn value(&self) -> f64 {
        (self.producer)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}

/// A settable gauge value, backing gauges registered through the `metrics`
/// facade.
#[derive(Debug, Default)]
pub struct GaugeCell {
    value: AtomicU64,
}

impl GaugeCell {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}

impl metrics::GaugeFn for GaugeCell {
    fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }

    fn increment(&self, value: f64) {
        self.update(|current| current + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|current| current - value);
    }
}

impl GaugeCell {
    fn update(&self, f: impl Fn(f64) -> f64) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some(f(f64::from_bits(bits)).to_bits())
            });
    }
}
