mod counter;
mod gauge;
mod histogram;
mod metric;

pub use counter::{AtomicCounter, delta};
pub use gauge::{Gauge, GaugeCell, GaugeSource};
pub use histogram::{
    BUCKET_COUNT, BUCKET_OFFSETS, Histogram, ImmutableHistogram, OFF_SCALE, OVERFLOW_BUCKET,
    bucket_index,
};
pub use metric::{MetricSnapshot, QUANTILES, RunningMetric};
