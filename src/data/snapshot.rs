use super::{CounterMetadata, CounterPayload, Quantile};
use crate::dispatch::{Logger, LoggerError};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// Identity of a single value in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ValueKey {
    provider: String,
    counter: String,
    tags: String,
    quantile: Option<String>,
}

impl ValueKey {
    fn new(provider: &str, counter: &str, tags: &str) -> ValueKey {
        ValueKey {
            provider: provider.to_owned(),
            counter: counter.to_owned(),
            tags: tags.to_owned(),
            quantile: None,
        }
    }

    fn from_metadata(metadata: &CounterMetadata, tags: &str) -> ValueKey {
        ValueKey::new(&metadata.provider_name, &metadata.counter_name, tags)
    }

    fn with_quantile(mut self, label: String) -> ValueKey {
        self.quantile = Some(label);
        self
    }

    fn is_instrument(&self, metadata: &CounterMetadata) -> bool {
        self.provider == metadata.provider_name && self.counter == metadata.counter_name
    }
}

// Rendered as `provider.counter`, then `[tags]` and `_label` when present, i.e.
// `MyMeter.latency[route=/]_p99`.
impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.provider, self.counter)?;
        if !self.tags.is_empty() {
            write!(f, "[{}]", self.tags)?;
        }
        if let Some(label) = &self.quantile {
            write!(f, "_{}", label)?;
        }
        Ok(())
    }
}

/// A point-in-time view of the latest decoded values.
///
/// Values are tracked per provider, counter and tag combination, with histogram quantiles tracked
/// separately under their label.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    values: HashMap<ValueKey, f64, FnvBuildHasher>,
    errors: Vec<String>,
}

impl Snapshot {
    /// Gets the latest untagged value of the given counter.
    ///
    /// Returns `None` if nothing was reported, or the instrument stopped reporting.
    pub fn value(&self, provider: &str, counter: &str) -> Option<f64> { self.tagged_value(provider, counter, "") }

    /// Gets the latest value of the given counter for one tag combination.
    pub fn tagged_value(&self, provider: &str, counter: &str, tags: &str) -> Option<f64> {
        self.values.get(&ValueKey::new(provider, counter, tags)).cloned()
    }

    /// Gets the latest value of the given quantile of an untagged histogram.
    pub fn quantile(&self, provider: &str, counter: &str, percentile: f64) -> Option<f64> {
        let label = Quantile::new(percentile, 0.0).label();
        let key = ValueKey::new(provider, counter, "").with_quantile(label);
        self.values.get(&key).cloned()
    }

    /// Error messages reported so far, oldest first.
    pub fn errors(&self) -> &[String] { &self.errors }

    /// Gets a collection of all the current values, keyed by their rendered name.
    pub fn get_values(&self) -> Vec<(String, f64)> { self.values.iter().map(|(k, v)| (k.to_string(), *v)).collect() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() && self.errors.is_empty() }

    pub(crate) fn update(&mut self, payload: &CounterPayload) {
        match payload {
            CounterPayload::Percentiles {
                measurement, quantiles, ..
            } => {
                let base = ValueKey::from_metadata(&measurement.metadata, &measurement.tags);
                for quantile in quantiles {
                    self.values.insert(base.clone().with_quantile(quantile.label()), quantile.value);
                }
            },
            // Drops every tag combination and quantile of the instrument.
            CounterPayload::Ended { metadata, .. } => self.values.retain(|k, _| !k.is_instrument(metadata)),
            CounterPayload::Error { message, .. } => self.errors.push(message.clone()),
            CounterPayload::BeginReporting { .. } => {},
            _ => {
                if let (Some(measurement), Some(value)) = (payload.measurement(), payload.value()) {
                    self.values
                        .insert(ValueKey::from_metadata(&measurement.metadata, &measurement.tags), value);
                }
            },
        }
    }
}

impl Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(&k.to_string(), v)?;
        }
        map.end()
    }
}

/// A logger that keeps the latest value of every instrument.
pub struct SnapshotLogger {
    inner: Arc<Mutex<Snapshot>>,
}

/// Read handle for the snapshot maintained by a `SnapshotLogger`.
#[derive(Clone)]
pub struct SnapshotHandle {
    inner: Arc<Mutex<Snapshot>>,
}

impl SnapshotLogger {
    pub fn new() -> SnapshotLogger {
        SnapshotLogger {
            inner: Arc::new(Mutex::new(Snapshot::default())),
        }
    }

    /// Creates a handle for reading the snapshot from another thread.
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            inner: self.inner.clone(),
        }
    }
}

impl Default for SnapshotLogger {
    fn default() -> SnapshotLogger { SnapshotLogger::new() }
}

impl Logger for SnapshotLogger {
    fn log(&mut self, payload: &CounterPayload) -> Result<(), LoggerError> {
        let mut snapshot = self
            .inner
            .lock()
            .map_err(|_| LoggerError::Failed("snapshot lock poisoned".to_owned()))?;
        snapshot.update(payload);
        Ok(())
    }

    fn name(&self) -> &str { "snapshot" }
}

impl SnapshotHandle {
    /// Gets a copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        match self.inner.lock() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Snapshot, SnapshotLogger};
    use crate::{
        data::{CounterMetadata, CounterPayload, ErrorKind, Measurement, Protocol, Quantile},
        dispatch::Logger,
    };
    use std::{sync::Arc, time::SystemTime};

    fn measurement(counter: &str, tags: &str) -> Measurement {
        Measurement {
            metadata: Arc::new(CounterMetadata {
                provider_name: "MyMeter".to_owned(),
                counter_name: counter.to_owned(),
                meter_tags: None,
                instrument_tags: None,
                scope_hash: None,
            }),
            protocol: Protocol::Metrics,
            timestamp: SystemTime::UNIX_EPOCH,
            display_name: counter.to_owned(),
            unit: String::new(),
            tags: tags.to_owned(),
        }
    }

    #[test]
    fn test_snapshot_latest_value_wins() {
        let mut snapshot = Snapshot::default();
        snapshot.update(&CounterPayload::Gauge {
            measurement: measurement("queue", ""),
            value: 1.0,
        });
        snapshot.update(&CounterPayload::Gauge {
            measurement: measurement("queue", ""),
            value: 2.0,
        });
        snapshot.update(&CounterPayload::Rate {
            measurement: measurement("requests", "route=/"),
            rate: 5.0,
            interval_secs: 1.0,
        });

        assert_eq!(snapshot.value("MyMeter", "queue"), Some(2.0));
        assert_eq!(snapshot.tagged_value("MyMeter", "requests", "route=/"), Some(5.0));
        assert_eq!(snapshot.value("MyMeter", "requests"), None);
        assert_eq!(snapshot.get_values().len(), 2);
    }

    #[test]
    fn test_snapshot_percentiles_and_ended() {
        let mut snapshot = Snapshot::default();
        snapshot.update(&CounterPayload::Percentiles {
            measurement: measurement("latency", ""),
            quantiles: vec![Quantile::new(0.5, 10.0), Quantile::new(0.99, 90.0)],
            count: None,
            sum: None,
        });
        assert_eq!(snapshot.quantile("MyMeter", "latency", 0.5), Some(10.0));
        assert_eq!(snapshot.quantile("MyMeter", "latency", 0.99), Some(90.0));
        assert_eq!(snapshot.quantile("MyMeter", "latency", 0.95), None);

        snapshot.update(&CounterPayload::Gauge {
            measurement: measurement("latency", "route=/"),
            value: 3.0,
        });
        assert_eq!(snapshot.tagged_value("MyMeter", "latency", "route=/"), Some(3.0));

        let metadata = measurement("latency", "").metadata;
        snapshot.update(&CounterPayload::Ended {
            metadata,
            timestamp: SystemTime::UNIX_EPOCH,
        });
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_ended_spares_similar_names() {
        fn gauge(provider: &str, counter: &str, value: f64) -> CounterPayload {
            let mut measurement = measurement(counter, "");
            measurement.metadata = Arc::new(CounterMetadata {
                provider_name: provider.to_owned(),
                ..(*measurement.metadata).clone()
            });
            CounterPayload::Gauge { measurement, value }
        }

        let mut snapshot = Snapshot::default();
        snapshot.update(&gauge("MyMeter", "latency", 1.0));
        snapshot.update(&gauge("MyMeter", "latency_total", 5.0));
        snapshot.update(&gauge("a.b", "c", 2.0));
        snapshot.update(&gauge("a", "b.c", 3.0));
        assert_eq!(snapshot.value("a.b", "c"), Some(2.0));
        assert_eq!(snapshot.value("a", "b.c"), Some(3.0));

        snapshot.update(&CounterPayload::Ended {
            metadata: measurement("latency", "").metadata,
            timestamp: SystemTime::UNIX_EPOCH,
        });
        assert_eq!(snapshot.value("MyMeter", "latency"), None);
        assert_eq!(snapshot.value("MyMeter", "latency_total"), Some(5.0));

        if let CounterPayload::Gauge { measurement, .. } = gauge("a.b", "c", 0.0) {
            snapshot.update(&CounterPayload::Ended {
                metadata: measurement.metadata,
                timestamp: SystemTime::UNIX_EPOCH,
            });
        }
        assert_eq!(snapshot.value("a.b", "c"), None);
        assert_eq!(snapshot.value("a", "b.c"), Some(3.0));
    }

    #[test]
    fn test_snapshot_logger_errors() {
        let mut logger = SnapshotLogger::new();
        let handle = logger.handle();

        logger
            .log(&CounterPayload::Error {
                kind: ErrorKind::HistogramLimitError,
                message: "limit".to_owned(),
                timestamp: SystemTime::UNIX_EPOCH,
            })
            .unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.errors(), &["limit".to_owned()]);
        assert_eq!(logger.name(), "snapshot");
    }
}
