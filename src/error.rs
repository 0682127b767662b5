use std::time::Duration;

use thiserror::Error;

/// Errors raised by the setup and export paths of the stats engine.
///
/// Hot-path operations (incrementing counters, recording timings) never fail;
/// only restoring state, serializing it and driving background tasks can.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Histogram expects {expected} buckets, got {actual}")]
    BucketCount { expected: usize, actual: usize },

    #[error("No tokio runtime available to drive the roller")]
    NoRuntime,

    #[error("Roller is already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Roll period must be non-zero, got {period:?}")]
    ZeroPeriod { period: Duration },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
