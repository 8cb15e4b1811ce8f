use super::{DecodeError, Decision};
use crate::{
    data::{CounterPayload, Measurement, Protocol},
    event::{lookup_f64, lookup_map, lookup_optional_str, lookup_str, RawEvent},
    filter::CounterFilter,
    registry::CounterMetadataRegistry,
};
use log::trace;
use std::collections::BTreeMap;

/// Name of the event carrying legacy counter samples.
pub const LEGACY_EVENT_NAME: &str = "EventCounters";

const SERIES_PREFIX: &str = "Interval=";

/// Decodes an `EventCounters` sample.
///
/// The sample is a keyed collection nested under `Payload` in field 0.  The legacy protocol has no
/// notion of sessions, so every sample that passes the filter is emitted.
pub(super) fn decode(
    filter: &CounterFilter, registry: &mut CounterMetadataRegistry, event: &RawEvent,
) -> Result<Decision, DecodeError> {
    let fields = lookup_map(event.map_field(0)?, "Payload")?;

    // The interval is only known once the series is parsed, so filtering happens here.
    let interval_ms = parse_series_interval(lookup_str(fields, "Series")?);
    let counter_name = lookup_str(fields, "Name")?;
    if !filter.is_included_legacy(&event.provider, counter_name, interval_ms) {
        trace!(
            "filtered legacy counter {}/{} at {}ms",
            event.provider,
            counter_name,
            interval_ms
        );
        return Ok(Decision::Suppress);
    }

    let interval_secs = lookup_f64(fields, "IntervalSec")?;
    let display_name = lookup_str(fields, "DisplayName")?;
    let mut display_units = lookup_str(fields, "DisplayUnits")?;

    let (is_rate, value) = match lookup_str(fields, "CounterType")? {
        "Mean" => (false, lookup_f64(fields, "Mean")?),
        "Sum" => {
            if display_units.is_empty() {
                display_units = "count";
            }
            (true, lookup_f64(fields, "Increment")?)
        },
        other => {
            trace!("unknown legacy counter type {} for {}/{}", other, event.provider, counter_name);
            return Ok(Decision::Suppress);
        },
    };

    // Older runtimes don't send metadata at all.
    let tags = match lookup_optional_str(fields, "Metadata")? {
        Some(text) => render_tags(&parse_metadata(text)),
        None => String::new(),
    };

    let measurement = Measurement {
        metadata: registry.get_or_create(&event.provider, counter_name, None, None, None),
        protocol: Protocol::Legacy,
        timestamp: event.timestamp,
        display_name: display_name.to_owned(),
        unit: display_units.to_owned(),
        tags,
    };

    let payload = if is_rate {
        CounterPayload::Rate {
            measurement,
            rate: value,
            interval_secs,
        }
    } else {
        CounterPayload::Gauge { measurement, value }
    };

    Ok(Decision::Emit(payload))
}

/// Parses a series name of the form `Interval=1000`.
///
/// The prefix is matched case-insensitively.  Anything unparseable is an interval of `0`.
pub(crate) fn parse_series_interval(series: &str) -> i64 {
    match series.get(..SERIES_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SERIES_PREFIX) => {
            series[SERIES_PREFIX.len()..].trim().parse::<i32>().map(i64::from).unwrap_or(0)
        },
        _ => 0,
    }
}

/// Parses counter metadata of the form `key:value,key:value`.
///
/// Each pair is split on its first colon.  If any pair has no colon at all, the whole map is
/// discarded: a value containing an unescaped comma breaks the framing of every pair after it, so
/// none of them can be trusted.  Duplicate keys keep the last value.
pub(crate) fn parse_metadata(text: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (pair, next) = match rest.find(',') {
            Some(comma) => (&rest[..comma], &rest[comma + 1..]),
            None => (rest, ""),
        };

        match pair.find(':') {
            Some(split) => {
                metadata.insert(pair[..split].to_owned(), pair[split + 1..].to_owned());
            },
            None => return BTreeMap::new(),
        }

        rest = next;
    }

    metadata
}

fn render_tags(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
