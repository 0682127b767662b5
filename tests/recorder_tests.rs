use loka_stats::Recorder;

#[test]
fn test_global_recorder() {
    assert!(Recorder::current().is_none());

    let recorder = Recorder::init().expect("Failed to initialize metrics recorder");
    assert!(Recorder::init().is_err());
    assert!(std::ptr::eq(Recorder::current().unwrap(), recorder));

    let view = recorder.registry().attach();

    metrics::counter!("app.requests.total").increment(3);
    metrics::gauge!("app.memory.usage").set(128.5);
    metrics::histogram!("app.response_time", "route" => "login").record(45.0);

    let registry = recorder.registry();
    assert_eq!(registry.counters()["app.requests.total"], 3);
    assert_eq!(registry.gauge_value("app.memory.usage"), Some(128.5));

    let summary = view.summary();
    assert_eq!(summary.counters["app.requests.total"], 3);
    assert_eq!(
        summary.metrics[r#"app.response_time{route="login"}"#].count,
        1
    );
}
