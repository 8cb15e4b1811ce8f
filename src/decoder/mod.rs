use crate::{data::CounterPayload, event::RawEvent, filter::CounterFilter, registry::CounterMetadataRegistry};
use fnv::FnvBuildHasher;
use hashbrown::HashSet;
use log::trace;
use thiserror::Error;

mod layout;
mod legacy;
mod metrics;
mod quantile;

pub use self::{
    layout::{Field, MetricsEvent},
    legacy::LEGACY_EVENT_NAME,
    metrics::METRICS_PROVIDER_NAME,
};

/// Errors while reading the fields of a single raw event.
///
/// A decode error only ever affects the event being decoded: the pipeline drops the event and
/// moves on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("field {index} is missing")]
    MissingField { index: usize },

    #[error("field {index} is not a {expected}")]
    FieldType { index: usize, expected: &'static str },

    #[error("payload key {key} is missing")]
    MissingKey { key: &'static str },

    #[error("payload key {key} is not a {expected}")]
    KeyType { key: &'static str, expected: &'static str },

    #[error("field {field:?} is not available at protocol version {version}")]
    UnavailableField { field: Field, version: u32 },
}

/// Outcome of decoding a raw event.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// The event decoded to a payload for consumers.
    Emit(CounterPayload),

    /// The event is not for us: another session's data, filtered out, or unknown.
    Suppress,
}

impl Decision {
    pub fn into_payload(self) -> Option<CounterPayload> {
        match self {
            Decision::Emit(payload) => Some(payload),
            Decision::Suppress => None,
        }
    }

    pub fn is_suppress(&self) -> bool { *self == Decision::Suppress }
}

/// Identity and limits of the collection session a decoder works for.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Correlates metrics-protocol messages to this collection request.
    pub session_id: String,

    /// Identity used by the target process for shared-session configuration errors.
    pub client_id: Option<String>,

    pub max_histograms: u32,
    pub max_time_series: u32,

    /// Emit `RateAndValue` instead of `Rate` when the message carries the cumulative value.
    pub use_counter_rate_and_value: bool,
}

impl SessionContext {
    pub fn new<S: Into<String>>(session_id: S) -> SessionContext {
        SessionContext {
            session_id: session_id.into(),
            ..Default::default()
        }
    }
}

impl Default for SessionContext {
    fn default() -> SessionContext {
        SessionContext {
            session_id: String::new(),
            client_id: None,
            max_histograms: 10,
            max_time_series: 1000,
            use_counter_rate_and_value: false,
        }
    }
}

/// Turns raw counter and metrics events into typed payloads.
///
/// A decoder owns its metadata registry and its record of inactive shared sessions, so any number
/// of decoders can run side by side in one process.  It is not meant to be shared between threads.
pub struct Decoder {
    filter: CounterFilter,
    context: SessionContext,
    registry: CounterMetadataRegistry,
    inactive_shared_sessions: HashSet<String, FnvBuildHasher>,
}

impl Decoder {
    pub fn new(filter: CounterFilter, context: SessionContext) -> Decoder {
        Decoder {
            filter,
            context,
            registry: CounterMetadataRegistry::new(),
            inactive_shared_sessions: HashSet::default(),
        }
    }

    pub fn filter(&self) -> &CounterFilter { &self.filter }

    pub fn context(&self) -> &SessionContext { &self.context }

    pub fn registry(&self) -> &CounterMetadataRegistry { &self.registry }

    /// Decodes a single raw event.
    ///
    /// Legacy `EventCounters` events are accepted from any provider.  Metrics-protocol events are
    /// only recognized from the metrics provider; anything else is suppressed.
    pub fn decode(&mut self, event: &RawEvent) -> Result<Decision, DecodeError> {
        if event.name == LEGACY_EVENT_NAME {
            return legacy::decode(&self.filter, &mut self.registry, event);
        }

        if event.provider != METRICS_PROVIDER_NAME {
            trace!("ignoring event {} from provider {}", event.name, event.provider);
            return Ok(Decision::Suppress);
        }

        match MetricsEvent::from_name(&event.name) {
            Some(kind) => self.decode_metrics(kind, event),
            None => {
                trace!("ignoring unknown metrics event {}", event.name);
                Ok(Decision::Suppress)
            },
        }
    }
}
