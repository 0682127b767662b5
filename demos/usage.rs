use std::sync::Arc;
use std::time::Duration;

use loka_stats::clock::SystemClock;
use loka_stats::line_protocol::{self, LineProtocolConfig};
use loka_stats::{Recorder, RollerConfig, TimeSeriesRoller};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let recorder = Recorder::init().expect("Failed to initialize metrics recorder");
    let registry = recorder.registry().clone();

    println!("=== Real-World Stats Example ===\n");

    let exposer = registry.attach();
    let roller = TimeSeriesRoller::new(
        registry.attach(),
        Arc::new(SystemClock),
        RollerConfig {
            period: Duration::from_secs(1),
            initial_delay: Duration::from_millis(100),
        },
    );
    roller.start().expect("Failed to start roller");

    registry.add_gauge("queue.depth", || 3.0);

    println!("--- Response Time Monitoring ---");
    simulate_response_times();

    println!("--- Direct Registry Use ---");
    for _ in 0..5 {
        registry.time("db.query", || std::thread::sleep(Duration::from_millis(3)));
        registry.incr("db.queries");
    }

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    roller.stop();

    println!("\n=== Exposer Summary ===");
    let summary = exposer.summary();
    println!(
        "{}",
        summary.to_json_pretty().expect("Failed to serialize summary")
    );

    println!("\n=== Line Protocol ===");
    let now = chrono::Utc::now().timestamp();
    print!("{}", line_protocol::render(&registry.summary(), &LineProtocolConfig::default(), now));

    println!("\n=== Time Series Keys ===");
    for key in roller.keys() {
        let series = roller.get(&key, None).unwrap_or_default();
        let latest = series.last().cloned().unwrap_or_default();
        println!("  {key}: latest {latest:?}");
    }
}

fn simulate_response_times() {
    let response_times = [12.0, 45.0, 23.0, 150.0, 89.0, 34.0, 67.0, 210.0, 18.0, 56.0];

    for (i, time) in response_times.iter().enumerate() {
        metrics::histogram!("api.response_time_ms").record(*time);
        metrics::counter!("api.requests_total").increment(1);

        if *time > 100.0 {
            metrics::counter!("api.slow_requests").increment(1);
        }

        println!("  Request {}: {:.1} ms", i + 1, time);
    }
}
