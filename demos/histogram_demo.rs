use loka_stats::types::{BUCKET_OFFSETS, OVERFLOW_BUCKET, bucket_index};
use loka_stats::{Histogram, OFF_SCALE, RunningMetric};
use std::time::Instant;

fn main() {
    println!("=== Histogram Bucket Layout Demo ===\n");

    println!("Finite boundaries: {}", BUCKET_OFFSETS.len());
    println!("Overflow bucket: {OVERFLOW_BUCKET}\n");

    let test_values = [0, 1, 2, 11, 12, 13, 500, 9_999, 9_999_999];

    for value in test_values {
        let bucket = bucket_index(value);
        let lower = if bucket == 0 { 0 } else { BUCKET_OFFSETS[bucket - 1] };
        match BUCKET_OFFSETS.get(bucket) {
            Some(upper) => println!("Value: {value:>9} → Bucket: {bucket:>2} [{lower}, {upper})"),
            None => println!("Value: {value:>9} → Bucket: {bucket:>2} [{lower}, ∞)"),
        }
    }

    println!("\n=== Percentiles ===");
    let mut histogram = Histogram::new();
    for value in [5, 10, 15, 20] {
        histogram.add(value);
    }

    for percentile in [0.0, 0.25, 0.5, 0.75, 0.9, 0.99, 1.0] {
        println!("p{:<5} → {}", percentile * 100.0, histogram.percentile(percentile));
    }

    histogram.add(100_000_000);
    let p100 = histogram.percentile(1.0);
    println!(
        "After an off-scale sample: p100 = {}",
        if p100 == OFF_SCALE { "off scale".to_string() } else { p100.to_string() }
    );

    println!("\n=== Running Metric ===");
    let metric = RunningMetric::new();
    for value in [10.0, 20.0, 60.0] {
        metric.add(value);
    }
    println!("Count: {}", metric.count());
    println!("Mean: {:.2}", metric.mean());
    println!("Min: {:.1}", metric.min());
    println!("Max: {:.1}", metric.max());
    println!("Std dev: {:.2}", metric.standard_deviation());
    for (quantile, value) in metric.percentiles() {
        println!("  q{quantile:<6} → {value}");
    }

    println!("\n=== Performance ===");
    benchmark_histogram_add();
    benchmark_running_metric_add();
}

fn benchmark_histogram_add() {
    let mut histogram = Histogram::new();
    let iterations = 1_000_000;

    let start = Instant::now();
    for i in 0..iterations {
        histogram.add(i % 2_000_000);
    }
    let elapsed = start.elapsed();

    println!(
        "Histogram::add: {:.2} ns/op ({} samples)",
        elapsed.as_nanos() as f64 / iterations as f64,
        histogram.total()
    );
}

fn benchmark_running_metric_add() {
    let metric = RunningMetric::new();
    let iterations = 1_000_000;

    let start = Instant::now();
    for i in 0..iterations {
        metric.add((i % 5_000) as f64);
    }
    let elapsed = start.elapsed();

    println!(
        "RunningMetric::add: {:.2} ns/op ({} samples)",
        elapsed.as_nanos() as f64 / iterations as f64,
        metric.count()
    );
}
