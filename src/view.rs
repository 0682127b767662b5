use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::MetricRegistry;
use crate::export::StatsSummary;
use crate::registry::Listener;
use crate::types::{AtomicCounter, MetricSnapshot, delta};

/// One consumer's private lens over a [`MetricRegistry`].
///
/// - **Counters** are reported as deltas since this view's previous read.
/// - **Metrics** are private copies fed by fan-out, reset on every read.
/// - **Gauges** are read live from the registry.
///
/// Views never interfere with each other: an HTTP exposer and a roller can
/// read the same registry at different cadences. Dropping a view detaches it.
#[derive(Debug)]
pub struct ConsumerView {
    registry: Arc<MetricRegistry>,
    listener: Arc<Listener>,
    last_counters: Mutex<HashMap<String, LastSeen>>,
}

/// The counter handle a value was read from, so a deleted and recreated
/// counter starts again from zero.
#[derive(Debug)]
struct LastSeen {
    counter: Arc<AtomicCounter>,
    value: i64,
}

impl ConsumerView {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        let listener = Arc::new(Listener::default());
        registry.add_listener(&listener);

        let last_counters = registry
            .counter_handles()
            .into_iter()
            .map(|(name, counter)| {
                let value = counter.value();
                (name, LastSeen { counter, value })
            })
            .collect();

        Self {
            registry,
            listener,
            last_counters: Mutex::new(last_counters),
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Events per counter since this view last asked.
    ///
    /// Deleted counters drop out; a counter recreated under an old name counts
    /// from zero.
    pub fn get_counters(&self) -> BTreeMap<String, u64> {
        let mut last_counters = self.last_counters.lock();
        let handles = self.registry.counter_handles();

        let mut deltas = BTreeMap::new();
        let mut seen = HashMap::with_capacity(handles.len());
        for (name, counter) in handles {
            let current = counter.value();
            let last = match last_counters.get(&name) {
                Some(last) if Arc::ptr_eq(&last.counter, &counter) => last.value,
                _ => 0,
            };
            deltas.insert(name.clone(), delta(last, current));
            seen.insert(
                name,
                LastSeen {
                    counter,
                    value: current,
                },
            );
        }
        *last_counters = seen;

        deltas
    }

    pub fn get_gauges(&self) -> BTreeMap<String, f64> {
        self.registry.gauges()
    }

    /// Snapshots and resets every metric copy owned by this view.
    pub fn get_metrics(&self) -> BTreeMap<String, MetricSnapshot> {
        self.listener
            .metrics()
            .into_iter()
            .map(|(name, metric)| (name, metric.snapshot_and_clear()))
            .collect()
    }

    /// Reads counters, metrics and gauges in one go, resetting as above.
    pub fn summary(&self) -> StatsSummary {
        let counters = self
            .get_counters()
            .into_iter()
            .map(|(name, value)| (name, i64::try_from(value).unwrap_or(i64::MAX)))
            .collect();
        let metrics = self.get_metrics();

        StatsSummary::new(counters, self.get_gauges(), &metrics)
    }
}

impl Drop for ConsumerView {
    fn drop(&mut self) {
        self.registry.remove_listener(&self.listener);
    }
}
