use std::sync::atomic::{AtomicI64, Ordering};

/// A signed 64-bit event counter.
///
/// Increments wrap around the `i64` range instead of panicking; readers
/// recover the number of events between two reads with [`delta`].
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Adds `n` and returns the new value.
    pub fn increment(&self, n: i64) -> i64 {
        self.value.fetch_add(n, Ordering::AcqRel).wrapping_add(n)
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }
}

impl metrics::CounterFn for AtomicCounter {
    fn increment(&self, value: u64) {
        AtomicCounter::increment(self, value as i64);
    }

    fn absolute(&self, value: u64) {
        self.value
            .fetch_max(i64::try_from(value).unwrap_or(i64::MAX), Ordering::AcqRel);
    }
}

/// Forward distance from `old` to `new` on the `i64` ring.
///
/// When `new < old` the counter is assumed to have wrapped, and the result is
/// `(i64::MAX - old) + (new - i64::MIN) + 1`. The result is never negative.
///
/// ```rust
/// use loka_stats::types::delta;
///
/// assert_eq!(delta(10, 25), 15);
/// assert_eq!(delta(i64::MAX - 1, i64::MIN + 1), 3);
/// ```
pub fn delta(old: i64, new: i64) -> u64 {
    // Two's complement subtraction already is the ring distance.
    new.wrapping_sub(old) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_returns_new_value() {
        let counter = AtomicCounter::default();
        assert_eq!(counter.increment(3), 3);
        assert_eq!(counter.increment(-1), 2);
        assert_eq!(counter.value(), 2);
    }

    #[test]
    fn test_increment_wraps() {
        let counter = AtomicCounter::new(i64::MAX);
        assert_eq!(counter.increment(1), i64::MIN);
    }

    #[test]
    fn test_delta_without_wrap() {
        assert_eq!(delta(0, 0), 0);
        assert_eq!(delta(-5, 5), 10);
        assert_eq!(delta(i64::MIN, -1), i64::MAX as u64);
    }

    #[test]
    fn test_delta_across_wrap() {
        assert_eq!(delta(i64::MAX - 1, i64::MIN + 1), 3);
        assert_eq!(delta(i64::MAX, i64::MIN), 1);

        let counter = AtomicCounter::new(i64::MAX - 10);
        let before = counter.value();
        counter.increment(25);
        assert_eq!(delta(before, counter.value()), 25);
    }

    #[test]
    fn test_facade_absolute_only_raises() {
        use metrics::CounterFn;

        let counter = AtomicCounter::new(10);
        counter.absolute(4);
        assert_eq!(counter.value(), 10);
        counter.absolute(40);
        assert_eq!(counter.value(), 40);
        CounterFn::increment(&counter, 2);
        assert_eq!(counter.value(), 42);
    }

    #[test]
    fn test_facade_absolute_saturates() {
        use metrics::CounterFn;

        let counter = AtomicCounter::new(10);
        counter.absolute(u64::MAX);
        assert_eq!(counter.value(), i64::MAX);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = std::sync::Arc::new(AtomicCounter::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment(1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.value(), 8000);
    }
}
