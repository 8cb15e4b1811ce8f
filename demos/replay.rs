#[macro_use]
extern crate log;
extern crate countertrace;
extern crate env_logger;
extern crate getopts;

use countertrace::{
    CounterFilter, CounterPayload, EventSink, FieldMap, FieldValue, Logger, LoggerError, Pipeline, RawEvent,
    SnapshotLogger, LEGACY_EVENT_NAME, METRICS_PROVIDER_NAME,
};
use getopts::Options;
use std::{
    env, thread,
    time::{Duration, SystemTime},
};

const SESSION: &str = "replay";

/// Prints every payload as it is decoded.
struct Printer;

impl Logger for Printer {
    fn log(&mut self, payload: &CounterPayload) -> Result<(), LoggerError> {
        match payload.measurement() {
            Some(m) => info!(
                "{:?} {}/{}{} = {:?} {}",
                payload.kind(),
                m.metadata.provider_name,
                m.metadata.counter_name,
                if m.tags.is_empty() { String::new() } else { format!("[{}]", m.tags) },
                payload.value(),
                m.unit
            ),
            None => info!("{:?}", payload),
        }
        Ok(())
    }

    fn pipeline_started(&mut self) -> Result<(), LoggerError> {
        info!("replay started");
        Ok(())
    }

    fn pipeline_stopped(&mut self) -> Result<(), LoggerError> {
        info!("replay stopped");
        Ok(())
    }
}

struct Generator {
    sink: EventSink,
    interval_ms: u64,
}

impl Generator {
    fn legacy(&self, name: &str, counter_type: &str, value: f64) -> RawEvent {
        let mut payload = FieldMap::default();
        payload.insert("Name".to_owned(), name.into());
        payload.insert("DisplayName".to_owned(), name.into());
        payload.insert("DisplayUnits".to_owned(), "".into());
        payload.insert("Series".to_owned(), format!("Interval={}", self.interval_ms).into());
        payload.insert("CounterType".to_owned(), counter_type.into());
        payload.insert("IntervalSec".to_owned(), (self.interval_ms as f64 / 1000.0).into());
        payload.insert("Metadata".to_owned(), "host:demo".into());
        payload.insert("Mean".to_owned(), value.into());
        payload.insert("Increment".to_owned(), value.into());

        let mut outer = FieldMap::default();
        outer.insert("Payload".to_owned(), FieldValue::from(payload));
        RawEvent::new(LEGACY_EVENT_NAME, "System.Runtime", SystemTime::now()).field(outer)
    }

    fn metrics(&self, name: &str, instrument: &str, unit: &str, values: &[String]) -> RawEvent {
        let mut event = RawEvent::new(name, METRICS_PROVIDER_NAME, SystemTime::now())
            .version(1)
            .field(SESSION)
            .field("Demo.Meter")
            .field("1.0")
            .field(instrument)
            .field(unit)
            .field("route=/");
        for value in values {
            event = event.field(value.as_str());
        }
        event
    }

    fn run(&self, rounds: u64) {
        for round in 0..rounds {
            let n = round as f64;
            let events = vec![
                self.legacy("cpu-usage", "Mean", (n * 7.0) % 100.0),
                self.legacy("exception-count", "Sum", n % 3.0),
                self.metrics("GaugeValuePublished", "queue-length", "{items}", &[format!("{}", round % 10)]),
                self.metrics(
                    "CounterRateValuePublished",
                    "requests",
                    "{requests}",
                    &[format!("{}", n * 1.5), format!("{}", n * n)],
                ),
                self.metrics(
                    "HistogramValuePublished",
                    "latency",
                    "ms",
                    &[format!("0.5={};0.95={};0.99={}", n, n * 2.0, n * 3.0), "10".to_owned(), format!("{}", n * 10.0)],
                ),
            ];

            for event in events {
                if self.sink.send(event).is_err() {
                    warn!("pipeline went away after {} rounds", round);
                    return;
                }
            }
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("r", "rounds", "number of rounds of events to replay", "INTEGER");
    opts.optopt("i", "interval", "refresh interval in milliseconds", "INTEGER");
    opts.optopt("c", "capacity", "maximum number of undecoded events", "INTEGER");
    opts.optflag("v", "rate-and-value", "report counters with their cumulative value");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_opt(matches: &getopts::Matches, name: &str, default: u64) -> Result<u64, String> {
    match matches.opt_str(name) {
        Some(s) => s.parse().map_err(|e| format!("invalid --{}: {}", name, e)),
        None => Ok(default),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        },
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    let parsed = parse_opt(&matches, "rounds", 5).and_then(|rounds| {
        let interval = parse_opt(&matches, "interval", 1000)?;
        let capacity = parse_opt(&matches, "capacity", 64)?;
        Ok((rounds, interval, capacity))
    });
    let (rounds, interval_ms, capacity) = match parsed {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return;
        },
    };

    info!("countertrace replay");
    info!("rounds: {}", rounds);
    info!("interval: {}ms", interval_ms);
    info!("capacity: {}", capacity);

    let snapshot_logger = SnapshotLogger::new();
    let snapshots = snapshot_logger.handle();

    let pipeline = Pipeline::builder()
        .session_id(SESSION)
        .filter(CounterFilter::all_counters(Duration::from_millis(interval_ms)))
        .use_counter_rate_and_value(matches.opt_present("rate-and-value"))
        .capacity(capacity as usize)
        .logger(Printer)
        .logger(snapshot_logger)
        .build();

    let generator = Generator {
        sink: pipeline.get_sink(),
        interval_ms,
    };
    let handle = thread::spawn(move || pipeline.run());

    generator.run(rounds);
    drop(generator);

    match handle.join() {
        Ok(Ok(())) => {},
        Ok(Err(e)) => error!("pipeline failed: {}", e),
        Err(_) => error!("pipeline thread panicked"),
    }

    let mut values = snapshots.snapshot().get_values();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in values {
        info!("final {} = {}", key, value);
    }
}
