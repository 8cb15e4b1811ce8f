use super::{
    layout::{Field, FieldReader, MetricsEvent},
    quantile::parse_quantiles,
    DecodeError, Decision, Decoder,
};
use crate::{
    data::{CounterPayload, ErrorKind, Measurement, Protocol},
    event::RawEvent,
    helper::parse_f64,
};
use log::trace;

/// Provider name of the metrics protocol event source.
pub const METRICS_PROVIDER_NAME: &str = "System.Diagnostics.Metrics";

const SESSION_IN_PROGRESS: &str = "Another metrics collection session is already in progress for the target process.";

impl Decoder {
    pub(super) fn decode_metrics(&mut self, kind: MetricsEvent, event: &RawEvent) -> Result<Decision, DecodeError> {
        let layout = kind.layout();
        if event.version < layout.min_version {
            trace!(
                "{} requires protocol version {}, got {}",
                event.name,
                layout.min_version,
                event.version
            );
            return Ok(Decision::Suppress);
        }

        let fields = layout.reader(event);
        let session_id = fields.text(Field::SessionId)?;

        // Both of these are about sessions other than the one that sent them.
        match kind {
            MetricsEvent::MultipleSessionsNotSupportedError => return Ok(self.sessions_not_supported(session_id, event)),
            MetricsEvent::MultipleSessionsConfiguredIncorrectlyError => {
                return self.sessions_configured_incorrectly(session_id, &fields, event)
            },
            _ => {},
        }

        if session_id != self.context.session_id {
            trace!("ignoring {} for session {}", event.name, session_id);
            return Ok(Decision::Suppress);
        }

        match kind {
            MetricsEvent::TimeSeriesLimitReached => {
                let message = limit_message("Time series", self.context.max_time_series);
                Ok(error(ErrorKind::TimeSeriesLimitError, message, event))
            },
            MetricsEvent::HistogramLimitReached => {
                let message = limit_message("Histogram", self.context.max_histograms);
                Ok(error(ErrorKind::HistogramLimitError, message, event))
            },
            MetricsEvent::Error => {
                let message = fields.text(Field::ErrorMessage)?.to_owned();
                Ok(error(ErrorKind::TargetProcessError, message, event))
            },
            MetricsEvent::ObservableInstrumentCallbackError => {
                let message = fields.text(Field::ErrorMessage)?.to_owned();
                Ok(error(ErrorKind::ObservableCallbackError, message, event))
            },
            _ => self.decode_instrument(kind, &fields, event),
        }
    }

    fn decode_instrument(
        &mut self, kind: MetricsEvent, fields: &FieldReader, event: &RawEvent,
    ) -> Result<Decision, DecodeError> {
        let meter = fields.text(Field::MeterName)?;
        let instrument = fields.text(Field::InstrumentName)?;
        if !self.filter.is_included_meter(meter, instrument) {
            trace!("filtered instrument {}/{}", meter, instrument);
            return Ok(Decision::Suppress);
        }

        if kind == MetricsEvent::BeginInstrumentReporting {
            let metadata = self.registry.get_or_create(
                meter,
                instrument,
                fields.optional_text(Field::MeterTags)?,
                fields.optional_text(Field::InstrumentTags)?,
                fields.optional_text(Field::ScopeHash)?,
            );
            return Ok(Decision::Emit(CounterPayload::BeginReporting {
                metadata,
                timestamp: event.timestamp,
            }));
        }

        let measurement = Measurement {
            metadata: self.registry.get_or_create(meter, instrument, None, None, None),
            protocol: Protocol::Metrics,
            timestamp: event.timestamp,
            display_name: instrument.to_owned(),
            unit: fields.text(Field::Unit)?.to_owned(),
            tags: fields.text(Field::Tags)?.to_owned(),
        };

        // A value that doesn't parse means the instrument produced nothing this interval, which
        // consumers need to see as such rather than as a zero.
        let payload = match kind {
            MetricsEvent::GaugeValuePublished => match parse_f64(fields.text(Field::Value)?) {
                Some(value) => CounterPayload::Gauge { measurement, value },
                None => ended(measurement),
            },
            MetricsEvent::CounterRateValuePublished => match parse_f64(fields.text(Field::Rate)?) {
                Some(rate) => {
                    let value = fields.optional_text(Field::AbsoluteValue)?.and_then(parse_f64);
                    match value {
                        Some(value) if self.context.use_counter_rate_and_value => CounterPayload::RateAndValue {
                            measurement,
                            rate,
                            value,
                        },
                        _ => CounterPayload::Rate {
                            measurement,
                            rate,
                            interval_secs: self.filter.interval_secs(),
                        },
                    }
                },
                None => ended(measurement),
            },
            MetricsEvent::UpDownCounterRateValuePublished => match parse_f64(fields.text(Field::Value)?) {
                Some(value) => CounterPayload::UpDown { measurement, value },
                None => ended(measurement),
            },
            MetricsEvent::HistogramValuePublished => CounterPayload::Percentiles {
                quantiles: parse_quantiles(fields.text(Field::Quantiles)?),
                count: fields.optional_text(Field::Count)?.and_then(|t| t.trim().parse::<u64>().ok()),
                sum: fields.optional_text(Field::Sum)?.and_then(parse_f64),
                measurement,
            },
            _ => return Ok(Decision::Suppress),
        };

        Ok(Decision::Emit(payload))
    }

    fn sessions_not_supported(&self, running_session_id: &str, event: &RawEvent) -> Decision {
        if running_session_id == self.context.session_id {
            // We're the session that is running; the error is for whoever tried to start after us.
            trace!("ignoring rejection of a session started after {}", running_session_id);
            return Decision::Suppress;
        }

        let message = format!("{} Concurrent sessions are not supported.", SESSION_IN_PROGRESS);
        error(ErrorKind::MultipleSessionsNotSupportedError, message, event)
    }

    fn sessions_configured_incorrectly(
        &mut self, payload_client_id: &str, fields: &FieldReader, event: &RawEvent,
    ) -> Result<Decision, DecodeError> {
        let client_id = match &self.context.client_id {
            Some(client_id) if client_id == payload_client_id => client_id.clone(),
            _ => return Ok(Decision::Suppress),
        };

        if self.inactive_shared_sessions.contains(&client_id) {
            trace!("configuration mismatch for client {} already reported", client_id);
            return Ok(Decision::Suppress);
        }

        let mut message = format!(
            "{} Concurrent sessions are supported, but only if all sessions are configured with the same settings:",
            SESSION_IN_PROGRESS
        );
        let settings = [
            ("MaxHistograms", Field::ExpectedMaxHistograms, Field::ActualMaxHistograms),
            ("MaxTimeSeries", Field::ExpectedMaxTimeSeries, Field::ActualMaxTimeSeries),
            ("RefreshInterval", Field::ExpectedRefreshInterval, Field::ActualRefreshInterval),
        ];
        for (name, expected, actual) in settings.iter() {
            let expected = fields.text(*expected)?;
            let actual = fields.text(*actual)?;
            if expected != actual {
                message.push_str(&format!("\n- {}: expected {}, actual {}", name, expected, actual));
            }
        }

        self.inactive_shared_sessions.insert(client_id);
        Ok(error(ErrorKind::MultipleSessionsConfiguredIncorrectlyError, message, event))
    }
}

fn limit_message(what: &str, limit: u32) -> String {
    format!(
        "Warning: {} tracking limit ({}) reached. Not all data is being shown. The limit can be changed but will use \
         more memory in the target process.",
        what, limit
    )
}

fn error(kind: ErrorKind, message: String, event: &RawEvent) -> Decision {
    Decision::Emit(CounterPayload::Error {
        kind,
        message,
        timestamp: event.timestamp,
    })
}

fn ended(measurement: Measurement) -> CounterPayload {
    CounterPayload::Ended {
        metadata: measurement.metadata,
        timestamp: measurement.timestamp,
    }
}
