//! Positional field layouts of the metrics protocol events.
//!
//! Fields were appended to the events over successive protocol versions.  Each event kind has one
//! table listing where its fields live and the version they first appeared in, so versioned access
//! is decided in one place rather than at every read.

use super::DecodeError;
use crate::event::RawEvent;

/// Events of the metrics protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricsEvent {
    BeginInstrumentReporting,
    GaugeValuePublished,
    CounterRateValuePublished,
    UpDownCounterRateValuePublished,
    HistogramValuePublished,
    TimeSeriesLimitReached,
    HistogramLimitReached,
    Error,
    ObservableInstrumentCallbackError,
    MultipleSessionsNotSupportedError,
    MultipleSessionsConfiguredIncorrectlyError,
}

impl MetricsEvent {
    pub fn from_name(name: &str) -> Option<MetricsEvent> {
        let kind = match name {
            "BeginInstrumentReporting" => MetricsEvent::BeginInstrumentReporting,
            "GaugeValuePublished" => MetricsEvent::GaugeValuePublished,
            "CounterRateValuePublished" => MetricsEvent::CounterRateValuePublished,
            "UpDownCounterRateValuePublished" => MetricsEvent::UpDownCounterRateValuePublished,
            "HistogramValuePublished" => MetricsEvent::HistogramValuePublished,
            "TimeSeriesLimitReached" => MetricsEvent::TimeSeriesLimitReached,
            "HistogramLimitReached" => MetricsEvent::HistogramLimitReached,
            "Error" => MetricsEvent::Error,
            "ObservableInstrumentCallbackError" => MetricsEvent::ObservableInstrumentCallbackError,
            "MultipleSessionsNotSupportedError" => MetricsEvent::MultipleSessionsNotSupportedError,
            "MultipleSessionsConfiguredIncorrectlyError" => MetricsEvent::MultipleSessionsConfiguredIncorrectlyError,
            _ => return None,
        };
        Some(kind)
    }

    pub fn layout(self) -> &'static Layout {
        match self {
            MetricsEvent::BeginInstrumentReporting => &BEGIN_INSTRUMENT_REPORTING,
            MetricsEvent::GaugeValuePublished => &GAUGE_VALUE_PUBLISHED,
            MetricsEvent::CounterRateValuePublished => &COUNTER_RATE_VALUE_PUBLISHED,
            MetricsEvent::UpDownCounterRateValuePublished => &UP_DOWN_COUNTER_RATE_VALUE_PUBLISHED,
            MetricsEvent::HistogramValuePublished => &HISTOGRAM_VALUE_PUBLISHED,
            MetricsEvent::TimeSeriesLimitReached | MetricsEvent::HistogramLimitReached => &LIMIT_REACHED,
            MetricsEvent::Error | MetricsEvent::ObservableInstrumentCallbackError => &ERROR,
            MetricsEvent::MultipleSessionsNotSupportedError => &MULTIPLE_SESSIONS_NOT_SUPPORTED,
            MetricsEvent::MultipleSessionsConfiguredIncorrectlyError => &MULTIPLE_SESSIONS_CONFIGURED_INCORRECTLY,
        }
    }
}

/// Named fields of the metrics protocol events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    SessionId,
    MeterName,
    MeterVersion,
    InstrumentName,
    Unit,
    Tags,
    Value,
    Rate,
    AbsoluteValue,
    Quantiles,
    Count,
    Sum,
    InstrumentTags,
    MeterTags,
    ScopeHash,
    ErrorMessage,
    ExpectedMaxHistograms,
    ActualMaxHistograms,
    ExpectedMaxTimeSeries,
    ActualMaxTimeSeries,
    ExpectedRefreshInterval,
    ActualRefreshInterval,
}

#[derive(Clone, Copy, Debug)]
pub struct Slot {
    pub field: Field,
    pub index: usize,
    pub since: u32,
}

const fn slot(field: Field, index: usize, since: u32) -> Slot { Slot { field, index, since } }

/// Field layout of one event kind.
#[derive(Debug)]
pub struct Layout {
    /// Events below this version don't carry enough to be decoded at all.
    pub min_version: u32,
    pub slots: &'static [Slot],
}

impl Layout {
    /// Gets the position of `field` in an event of the given version.
    ///
    /// Returns `None` if the field doesn't exist in this event kind, or was added after `version`.
    pub fn index_of(&self, field: Field, version: u32) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.field == field)
            .filter(|s| version >= s.since)
            .map(|s| s.index)
    }

    /// Binds this layout to an event for reading.
    pub fn reader<'a>(&'static self, event: &'a RawEvent) -> FieldReader<'a> { FieldReader { layout: self, event } }
}

/// Reads named fields out of an event according to its layout.
pub struct FieldReader<'a> {
    layout: &'static Layout,
    event: &'a RawEvent,
}

impl<'a> FieldReader<'a> {
    /// Reads a field that must be present at this event's version.
    pub fn text(&self, field: Field) -> Result<&'a str, DecodeError> {
        match self.layout.index_of(field, self.event.version) {
            Some(index) => self.event.str_field(index),
            None => Err(DecodeError::UnavailableField {
                field,
                version: self.event.version,
            }),
        }
    }

    /// Reads a field that may be absent, either because this event's version predates it or
    /// because the sender left it off.
    pub fn optional_text(&self, field: Field) -> Result<Option<&'a str>, DecodeError> {
        match self.layout.index_of(field, self.event.version) {
            Some(index) => self.event.optional_str_field(index),
            None => Ok(None),
        }
    }
}

const INSTRUMENT_HEADER: [Slot; 4] = [
    slot(Field::SessionId, 0, 0),
    slot(Field::MeterName, 1, 0),
    slot(Field::MeterVersion, 2, 0),
    slot(Field::InstrumentName, 3, 0),
];

static BEGIN_INSTRUMENT_REPORTING: Layout = Layout {
    min_version: 0,
    slots: &[
        INSTRUMENT_HEADER[0],
        INSTRUMENT_HEADER[1],
        INSTRUMENT_HEADER[2],
        INSTRUMENT_HEADER[3],
        slot(Field::InstrumentTags, 7, 1),
        slot(Field::MeterTags, 8, 1),
        slot(Field::ScopeHash, 9, 1),
    ],
};

static GAUGE_VALUE_PUBLISHED: Layout = Layout {
    min_version: 0,
    slots: &[
        INSTRUMENT_HEADER[0],
        INSTRUMENT_HEADER[1],
        INSTRUMENT_HEADER[2],
        INSTRUMENT_HEADER[3],
        slot(Field::Unit, 4, 0),
        slot(Field::Tags, 5, 0),
        slot(Field::Value, 6, 0),
    ],
};

static COUNTER_RATE_VALUE_PUBLISHED: Layout = Layout {
    min_version: 0,
    slots: &[
        INSTRUMENT_HEADER[0],
        INSTRUMENT_HEADER[1],
        INSTRUMENT_HEADER[2],
        INSTRUMENT_HEADER[3],
        slot(Field::Unit, 4, 0),
        slot(Field::Tags, 5, 0),
        slot(Field::Rate, 6, 0),
        slot(Field::AbsoluteValue, 7, 1),
    ],
};

// The rate at 6 is not read: up/down counters report an absolute value.
static UP_DOWN_COUNTER_RATE_VALUE_PUBLISHED: Layout = Layout {
    min_version: 1,
    slots: &[
        INSTRUMENT_HEADER[0],
        INSTRUMENT_HEADER[1],
        INSTRUMENT_HEADER[2],
        INSTRUMENT_HEADER[3],
        slot(Field::Unit, 4, 0),
        slot(Field::Tags, 5, 0),
        slot(Field::Rate, 6, 0),
        slot(Field::Value, 7, 1),
    ],
};

static HISTOGRAM_VALUE_PUBLISHED: Layout = Layout {
    min_version: 0,
    slots: &[
        INSTRUMENT_HEADER[0],
        INSTRUMENT_HEADER[1],
        INSTRUMENT_HEADER[2],
        INSTRUMENT_HEADER[3],
        slot(Field::Unit, 4, 0),
        slot(Field::Tags, 5, 0),
        slot(Field::Quantiles, 6, 0),
        slot(Field::Count, 7, 1),
        slot(Field::Sum, 8, 1),
    ],
};

static LIMIT_REACHED: Layout = Layout {
    min_version: 0,
    slots: &[slot(Field::SessionId, 0, 0)],
};

static ERROR: Layout = Layout {
    min_version: 0,
    slots: &[slot(Field::SessionId, 0, 0), slot(Field::ErrorMessage, 1, 0)],
};

static MULTIPLE_SESSIONS_NOT_SUPPORTED: Layout = Layout {
    min_version: 0,
    slots: &[slot(Field::SessionId, 0, 0)],
};

// Keyed by client id rather than session id; field 0 is named for what it carries on the wire.
static MULTIPLE_SESSIONS_CONFIGURED_INCORRECTLY: Layout = Layout {
    min_version: 0,
    slots: &[
        slot(Field::SessionId, 0, 0),
        slot(Field::ExpectedMaxHistograms, 1, 0),
        slot(Field::ActualMaxHistograms, 2, 0),
        slot(Field::ExpectedMaxTimeSeries, 3, 0),
        slot(Field::ActualMaxTimeSeries, 4, 0),
        slot(Field::ExpectedRefreshInterval, 5, 0),
        slot(Field::ActualRefreshInterval, 6, 0),
    ],
};
