use countertrace::{
    CounterFilter, CounterPayload, FieldMap, FieldValue, Logger, LoggerError, Pipeline, PipelineError, RawEvent,
    SinkError, SnapshotLogger, LEGACY_EVENT_NAME, METRICS_PROVIDER_NAME,
};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, SystemTime},
};

const SESSION: &str = "session-1";

fn legacy(counter: &str, counter_type: &str, value: f64) -> RawEvent {
    let mut payload = FieldMap::default();
    payload.insert("Name".to_owned(), FieldValue::from(counter));
    payload.insert("DisplayName".to_owned(), FieldValue::from("Display"));
    payload.insert("DisplayUnits".to_owned(), FieldValue::from("%"));
    payload.insert("Series".to_owned(), FieldValue::from("Interval=1000"));
    payload.insert("CounterType".to_owned(), FieldValue::from(counter_type));
    payload.insert("IntervalSec".to_owned(), FieldValue::from(1.0));
    payload.insert("Mean".to_owned(), FieldValue::from(value));
    payload.insert("Increment".to_owned(), FieldValue::from(value));

    let mut outer = FieldMap::default();
    outer.insert("Payload".to_owned(), FieldValue::from(payload));

    RawEvent::new(LEGACY_EVENT_NAME, "System.Runtime", SystemTime::now()).field(outer)
}

fn metrics(name: &str, instrument: &str, values: &[&str]) -> RawEvent {
    let mut event = RawEvent::new(name, METRICS_PROVIDER_NAME, SystemTime::now())
        .version(1)
        .field(SESSION)
        .field("MyMeter")
        .field("1.0")
        .field(instrument)
        .field("ms")
        .field("");
    for value in values {
        event = event.field(*value);
    }
    event
}

struct Exploding;

impl Logger for Exploding {
    fn log(&mut self, _payload: &CounterPayload) -> Result<(), LoggerError> { panic!("exploding logger") }

    fn pipeline_stopped(&mut self) -> Result<(), LoggerError> { Err(LoggerError::Failed("gone".to_owned())) }
}

#[derive(Clone, Default)]
struct Lifecycle {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl Logger for Lifecycle {
    fn log(&mut self, _payload: &CounterPayload) -> Result<(), LoggerError> {
        self.events.lock().unwrap().push("log");
        Ok(())
    }

    fn pipeline_started(&mut self) -> Result<(), LoggerError> {
        self.events.lock().unwrap().push("started");
        Ok(())
    }

    fn pipeline_stopped(&mut self) -> Result<(), LoggerError> {
        self.events.lock().unwrap().push("stopped");
        Ok(())
    }
}

#[test]
fn test_threaded_pipeline_feeds_snapshot() {
    let _ = env_logger::builder().is_test(true).try_init();

    let logger = SnapshotLogger::new();
    let snapshots = logger.handle();
    let lifecycle = Lifecycle::default();

    let pipeline = Pipeline::builder()
        .session_id(SESSION)
        .filter(CounterFilter::all_counters(Duration::from_secs(1)))
        .logger(Exploding)
        .logger(logger)
        .logger(lifecycle.clone())
        .capacity(4)
        .build();
    let sink = pipeline.get_sink();
    let handle = thread::spawn(move || pipeline.run());

    let producer = {
        let sink = sink.clone();
        thread::spawn(move || {
            sink.send(legacy("cpu-usage", "Mean", 12.5)).unwrap();
            sink.send(legacy("exceptions", "Sum", 3.0)).unwrap();
            sink.send(legacy("odd", "Median", 1.0)).unwrap();
        })
    };
    producer.join().unwrap();

    sink.send(metrics("GaugeValuePublished", "queue", &["7"])).unwrap();
    sink.send(RawEvent::new("GaugeValuePublished", METRICS_PROVIDER_NAME, SystemTime::now()).field(SESSION))
        .unwrap();
    sink.send(metrics("HistogramValuePublished", "latency", &["0.5=10;0.99=90", "4", "100"]))
        .unwrap();
    sink.send(metrics("GaugeValuePublished", "stale", &["1"])).unwrap();
    sink.send(metrics("GaugeValuePublished", "stale", &[""])).unwrap();
    drop(sink);

    handle.join().unwrap().unwrap();

    let snapshot = snapshots.snapshot();
    assert_eq!(snapshot.value("System.Runtime", "cpu-usage"), Some(12.5));
    assert_eq!(snapshot.value("System.Runtime", "exceptions"), Some(3.0));
    assert_eq!(snapshot.value("System.Runtime", "odd"), None);
    assert_eq!(snapshot.value("MyMeter", "queue"), Some(7.0));
    assert_eq!(snapshot.quantile("MyMeter", "latency", 0.5), Some(10.0));
    assert_eq!(snapshot.quantile("MyMeter", "latency", 0.99), Some(90.0));
    assert_eq!(snapshot.value("MyMeter", "stale"), None);
    assert!(snapshot.errors().is_empty());

    // Six payloads: two legacy values, the gauge, the histogram, and the stale gauge plus its end.
    let events = lifecycle.events.lock().unwrap().clone();
    assert_eq!(events.first(), Some(&"started"));
    assert_eq!(events.last(), Some(&"stopped"));
    assert_eq!(events.iter().filter(|e| **e == "log").count(), 6);
}

#[test]
fn test_controller_stops_pipeline() {
    let lifecycle = Lifecycle::default();
    let pipeline = Pipeline::builder().session_id(SESSION).logger(lifecycle.clone()).build();
    let sink = pipeline.get_sink();
    let controller = pipeline.get_controller();

    let handle = thread::spawn(move || pipeline.run());
    controller.stop().unwrap();
    handle.join().unwrap().unwrap();

    assert_eq!(*lifecycle.events.lock().unwrap(), vec!["started", "stopped"]);

    match sink.send(metrics("GaugeValuePublished", "queue", &["1"])) {
        Err(SinkError::Disconnected(event)) => assert_eq!(event.name, "GaugeValuePublished"),
        Ok(()) => panic!("sink should be disconnected"),
    }
    assert_eq!(controller.stop(), Err(PipelineError::Disconnected));
}

#[test]
fn test_session_errors_reach_loggers() {
    let logger = SnapshotLogger::new();
    let snapshots = logger.handle();

    let mut pipeline = Pipeline::builder()
        .session_id(SESSION)
        .max_time_series(50)
        .logger(logger)
        .build();
    pipeline.start().unwrap();
    pipeline
        .process(&RawEvent::new("TimeSeriesLimitReached", METRICS_PROVIDER_NAME, SystemTime::now()).field(SESSION))
        .unwrap();
    pipeline
        .process(&RawEvent::new("TimeSeriesLimitReached", METRICS_PROVIDER_NAME, SystemTime::now()).field("other"))
        .unwrap();
    pipeline.stop();

    let snapshot = snapshots.snapshot();
    assert_eq!(snapshot.errors().len(), 1);
    assert!(snapshot.errors()[0].contains("Time series tracking limit (50) reached"));
}
