use serde::Serialize;
use std::{fmt, sync::Arc, time::SystemTime};

pub mod snapshot;

pub use self::snapshot::{Snapshot, SnapshotHandle, SnapshotLogger};

/// Identity of a reporting provider/instrument pair.
///
/// Metadata is interned by the registry the first time a pair is observed, and every payload for
/// that pair shares the same `Arc`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CounterMetadata {
    pub provider_name: String,
    pub counter_name: String,
    pub meter_tags: Option<String>,
    pub instrument_tags: Option<String>,
    pub scope_hash: Option<String>,
}

/// The wire protocol a payload was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    /// The aggregate `EventCounters` protocol.
    Legacy,

    /// The per-instrument `System.Diagnostics.Metrics` protocol.
    Metrics,
}

/// Kinds of error payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// An error message surfaced verbatim from the target process.
    TargetProcessError,

    /// An observable instrument's callback threw in the target process.
    ObservableCallbackError,

    /// The histogram tracking limit was hit.  Collection continues, but is incomplete.
    HistogramLimitError,

    /// The time series tracking limit was hit.  Collection continues, but is incomplete.
    TimeSeriesLimitError,

    /// This session was superseded by a newer, incompatible one.
    MultipleSessionsNotSupportedError,

    /// A shared session is already running with different limits or interval.
    MultipleSessionsConfiguredIncorrectlyError,
}

impl ErrorKind {
    /// Whether this error is about a conflict with another collection session.
    ///
    /// The pipeline never stops itself because of an error payload; the surrounding session layer
    /// uses this to decide whether to give up.
    pub fn is_session_conflict(self) -> bool {
        match self {
            ErrorKind::MultipleSessionsNotSupportedError | ErrorKind::MultipleSessionsConfiguredIncorrectlyError => true,
            _ => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ErrorKind::TargetProcessError => "target process error",
            ErrorKind::ObservableCallbackError => "observable callback error",
            ErrorKind::HistogramLimitError => "histogram limit reached",
            ErrorKind::TimeSeriesLimitError => "time series limit reached",
            ErrorKind::MultipleSessionsNotSupportedError => "multiple sessions not supported",
            ErrorKind::MultipleSessionsConfiguredIncorrectlyError => "multiple sessions configured incorrectly",
        };
        f.write_str(label)
    }
}

/// A histogram sample point.
///
/// `percentile` is a quantile in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Quantile {
    pub percentile: f64,
    pub value: f64,
}

impl Quantile {
    pub fn new(percentile: f64, value: f64) -> Quantile { Quantile { percentile, value } }

    /// Display label for this quantile.
    ///
    /// `0` and `1` are labeled `min` and `max`, everything else is labeled by its percentage with
    /// the decimal point dropped, so `0.99` is `p99` and `0.999` is `p999`.
    pub fn label(&self) -> String {
        // Force our value between 0 and 100, and shave off float noise from the multiplication.
        let clamped = self.percentile.max(0.0).min(1.0);
        let percent = (clamped * 100.0 * 10_000.0).round() / 10_000.0;

        let raw_label = format!("{}", percent);
        match raw_label.as_str() {
            "0" => "min".to_string(),
            "100" => "max".to_string(),
            _ => format!("p{}", raw_label).replace(".", ""),
        }
    }
}

/// Fields shared by every measurement-carrying payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub metadata: Arc<CounterMetadata>,
    pub protocol: Protocol,
    pub timestamp: SystemTime,
    pub display_name: String,
    pub unit: String,
    pub tags: String,
}

/// A decoded measurement record.
///
/// Consumers match on the variant; there is no behavior attached to the individual kinds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CounterPayload {
    /// A last-value measurement.
    Gauge { measurement: Measurement, value: f64 },

    /// A rate over the nominal reporting interval.
    Rate {
        measurement: Measurement,
        rate: f64,
        interval_secs: f64,
    },

    /// A rate along with the cumulative value it was derived from.
    RateAndValue {
        measurement: Measurement,
        rate: f64,
        value: f64,
    },

    /// The absolute value of an up/down counter.
    UpDown { measurement: Measurement, value: f64 },

    /// A histogram snapshot, in the order the quantiles were reported.
    Percentiles {
        measurement: Measurement,
        quantiles: Vec<Quantile>,
        count: Option<u64>,
        sum: Option<f64>,
    },

    /// The instrument produced no measurement this interval.
    ///
    /// This is distinct from a zero value: the observable callback may have thrown, or the tag
    /// combination was simply not reported.
    Ended {
        metadata: Arc<CounterMetadata>,
        timestamp: SystemTime,
    },

    /// The instrument was observed for the first time.
    BeginReporting {
        metadata: Arc<CounterMetadata>,
        timestamp: SystemTime,
    },

    /// An error reported by, or about, the collection session.
    Error {
        kind: ErrorKind,
        message: String,
        timestamp: SystemTime,
    },
}

/// Fieldless discriminant of a `CounterPayload`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadKind {
    Gauge,
    Rate,
    RateAndValue,
    UpDown,
    Percentiles,
    Ended,
    BeginReporting,
    Error,
}

impl CounterPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            CounterPayload::Gauge { .. } => PayloadKind::Gauge,
            CounterPayload::Rate { .. } => PayloadKind::Rate,
            CounterPayload::RateAndValue { .. } => PayloadKind::RateAndValue,
            CounterPayload::UpDown { .. } => PayloadKind::UpDown,
            CounterPayload::Percentiles { .. } => PayloadKind::Percentiles,
            CounterPayload::Ended { .. } => PayloadKind::Ended,
            CounterPayload::BeginReporting { .. } => PayloadKind::BeginReporting,
            CounterPayload::Error { .. } => PayloadKind::Error,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            CounterPayload::Gauge { measurement, .. }
            | CounterPayload::Rate { measurement, .. }
            | CounterPayload::RateAndValue { measurement, .. }
            | CounterPayload::UpDown { measurement, .. }
            | CounterPayload::Percentiles { measurement, .. } => measurement.timestamp,
            CounterPayload::Ended { timestamp, .. }
            | CounterPayload::BeginReporting { timestamp, .. }
            | CounterPayload::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Gets the instrument identity of this payload.
    ///
    /// Returns `None` for error payloads, which carry no instrument identity.
    pub fn metadata(&self) -> Option<&Arc<CounterMetadata>> {
        match self {
            CounterPayload::Ended { metadata, .. } | CounterPayload::BeginReporting { metadata, .. } => Some(metadata),
            CounterPayload::Error { .. } => None,
            _ => self.measurement().map(|m| &m.metadata),
        }
    }

    /// Gets the shared measurement fields, if this payload carries a measurement.
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            CounterPayload::Gauge { measurement, .. }
            | CounterPayload::Rate { measurement, .. }
            | CounterPayload::RateAndValue { measurement, .. }
            | CounterPayload::UpDown { measurement, .. }
            | CounterPayload::Percentiles { measurement, .. } => Some(measurement),
            _ => None,
        }
    }

    /// Gets the single headline value of this payload.
    ///
    /// For rates this is the rate, not the cumulative value.  Percentiles, markers and errors have
    /// no single value.
    pub fn value(&self) -> Option<f64> {
        match self {
            CounterPayload::Gauge { value, .. } | CounterPayload::UpDown { value, .. } => Some(*value),
            CounterPayload::Rate { rate, .. } | CounterPayload::RateAndValue { rate, .. } => Some(*rate),
            _ => None,
        }
    }

    /// Whether this payload came from the metrics protocol.
    ///
    /// Instrument markers only exist in the metrics protocol.  Errors are never meter payloads.
    pub fn is_meter(&self) -> bool {
        match self {
            CounterPayload::Ended { .. } | CounterPayload::BeginReporting { .. } => true,
            CounterPayload::Error { .. } => false,
            _ => self.measurement().map_or(false, |m| m.protocol == Protocol::Metrics),
        }
    }

    pub fn is_error(&self) -> bool { self.kind() == PayloadKind::Error }
}

#[cfg(test)]
mod tests {
    use super::{CounterMetadata, CounterPayload, ErrorKind, Measurement, PayloadKind, Protocol, Quantile};
    use std::{sync::Arc, time::SystemTime};

    fn metadata() -> Arc<CounterMetadata> {
        Arc::new(CounterMetadata {
            provider_name: "System.Runtime".to_owned(),
            counter_name: "cpu-usage".to_owned(),
            meter_tags: None,
            instrument_tags: None,
            scope_hash: None,
        })
    }

    fn measurement(protocol: Protocol) -> Measurement {
        Measurement {
            metadata: metadata(),
            protocol,
            timestamp: SystemTime::UNIX_EPOCH,
            display_name: "CPU Usage".to_owned(),
            unit: "%".to_owned(),
            tags: String::new(),
        }
    }

    #[test]
    fn test_quantile_labels() {
        assert_eq!(Quantile::new(0.0, 1.0).label(), "min");
        assert_eq!(Quantile::new(1.0, 1.0).label(), "max");
        assert_eq!(Quantile::new(0.5, 1.0).label(), "p50");
        assert_eq!(Quantile::new(0.95, 1.0).label(), "p95");
        assert_eq!(Quantile::new(0.99, 1.0).label(), "p99");
        assert_eq!(Quantile::new(0.999, 1.0).label(), "p999");
        assert_eq!(Quantile::new(0.9999, 1.0).label(), "p9999");
    }

    #[test]
    fn test_quantile_labels_clamped() {
        assert_eq!(Quantile::new(-0.2, 1.0).label(), "min");
        assert_eq!(Quantile::new(14.42, 1.0).label(), "max");
    }

    #[test]
    fn test_payload_accessors() {
        let gauge = CounterPayload::Gauge {
            measurement: measurement(Protocol::Legacy),
            value: 42.0,
        };
        assert_eq!(gauge.kind(), PayloadKind::Gauge);
        assert_eq!(gauge.value(), Some(42.0));
        assert_eq!(gauge.timestamp(), SystemTime::UNIX_EPOCH);
        assert_eq!(gauge.metadata().map(|m| m.counter_name.as_str()), Some("cpu-usage"));
        assert!(!gauge.is_meter());

        let rate = CounterPayload::RateAndValue {
            measurement: measurement(Protocol::Metrics),
            rate: 3.0,
            value: 300.0,
        };
        assert_eq!(rate.value(), Some(3.0));
        assert!(rate.is_meter());

        let ended = CounterPayload::Ended {
            metadata: metadata(),
            timestamp: SystemTime::UNIX_EPOCH,
        };
        assert!(ended.is_meter());
        assert!(ended.value().is_none());
        assert!(ended.measurement().is_none());
        assert!(ended.metadata().is_some());
    }

    #[test]
    fn test_error_payload() {
        let error = CounterPayload::Error {
            kind: ErrorKind::HistogramLimitError,
            message: "limit".to_owned(),
            timestamp: SystemTime::UNIX_EPOCH,
        };
        assert!(error.is_error());
        assert!(!error.is_meter());
        assert!(error.metadata().is_none());
    }

    #[test]
    fn test_error_kind_session_conflict() {
        assert!(ErrorKind::MultipleSessionsNotSupportedError.is_session_conflict());
        assert!(ErrorKind::MultipleSessionsConfiguredIncorrectlyError.is_session_conflict());
        assert!(!ErrorKind::TargetProcessError.is_session_conflict());
        assert!(!ErrorKind::TimeSeriesLimitError.is_session_conflict());
    }
}
