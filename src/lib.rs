//! Decoding of runtime performance counter events.
//!
//! A diagnostic session streams raw events out of a target process: the legacy `EventCounters`
//! events, and the richer events of the `System.Diagnostics.Metrics` protocol.  This crate turns
//! those raw events into typed `CounterPayload`s and fans them out to any number of `Logger`s.
//!
//! The usual entry point is a `Pipeline`, which owns a `Decoder` and a set of loggers:
//!
//! ```
//! use countertrace::{CounterFilter, Pipeline, SnapshotLogger};
//! use std::{thread, time::Duration};
//!
//! let logger = SnapshotLogger::new();
//! let snapshots = logger.handle();
//!
//! let pipeline = Pipeline::builder()
//!     .session_id("session-1")
//!     .filter(CounterFilter::all_counters(Duration::from_secs(1)))
//!     .logger(logger)
//!     .build();
//! let sink = pipeline.get_sink();
//! let controller = pipeline.get_controller();
//!
//! let handle = thread::spawn(move || pipeline.run());
//! // Hand raw events from the session transport to `sink` here.
//! drop(sink);
//! let _ = controller.stop();
//! handle.join().unwrap().unwrap();
//!
//! assert!(snapshots.snapshot().is_empty());
//! ```
mod configuration;
mod control;
mod data;
mod decoder;
mod dispatch;
mod event;
mod filter;
mod helper;
mod pipeline;
mod registry;
mod sink;

pub use self::{
    configuration::Configuration,
    control::Controller,
    data::{
        CounterMetadata, CounterPayload, ErrorKind, Measurement, PayloadKind, Protocol, Quantile, Snapshot,
        SnapshotHandle, SnapshotLogger,
    },
    decoder::{
        DecodeError, Decision, Decoder, Field, MetricsEvent, SessionContext, LEGACY_EVENT_NAME, METRICS_PROVIDER_NAME,
    },
    dispatch::{Dispatcher, Logger, LoggerError},
    event::{FieldMap, FieldValue, RawEvent},
    filter::CounterFilter,
    pipeline::{Pipeline, PipelineError, PipelineState},
    registry::CounterMetadataRegistry,
    sink::{EventSink, SinkError},
};
