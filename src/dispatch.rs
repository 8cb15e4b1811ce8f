use crate::data::CounterPayload;
use log::{debug, warn};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use thiserror::Error;

/// Errors a consumer can report back to the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoggerError {
    /// The consumer has already been torn down.  This is expected during shutdown.
    #[error("logger already disposed")]
    Disposed,

    #[error("logger failed: {0}")]
    Failed(String),
}

/// A consumer of decoded payloads.
///
/// Every call is isolated by the pipeline: an error, or a panic, in one logger is logged and
/// discarded, and never prevents other loggers from being called.  Calls are made synchronously
/// from the decode loop, so a slow logger slows down the whole pipeline.
///
/// Lifecycle notifications take no cancellation token: a logger that needs to give up early should
/// bound its own work and return.
pub trait Logger: Send {
    /// Handles a single payload.
    fn log(&mut self, payload: &CounterPayload) -> Result<(), LoggerError>;

    /// Called once, before any payload is delivered.
    fn pipeline_started(&mut self) -> Result<(), LoggerError> { Ok(()) }

    /// Called once, after the last payload was delivered.
    fn pipeline_stopped(&mut self) -> Result<(), LoggerError> { Ok(()) }

    /// Name used when reporting failures of this logger.
    fn name(&self) -> &str { std::any::type_name::<Self>() }
}

/// Fans payloads and lifecycle notifications out to a set of loggers, in registration order.
#[derive(Default)]
pub struct Dispatcher {
    loggers: Vec<Box<dyn Logger>>,
}

impl Dispatcher {
    pub fn new(loggers: Vec<Box<dyn Logger>>) -> Dispatcher { Dispatcher { loggers } }

    pub fn add_logger(&mut self, logger: Box<dyn Logger>) { self.loggers.push(logger); }

    pub fn len(&self) -> usize { self.loggers.len() }

    pub fn is_empty(&self) -> bool { self.loggers.is_empty() }

    pub fn started(&mut self) {
        for logger in self.loggers.iter_mut() {
            invoke(logger.as_mut(), "pipeline_started", |l| l.pipeline_started());
        }
    }

    pub fn stopped(&mut self) {
        for logger in self.loggers.iter_mut() {
            invoke(logger.as_mut(), "pipeline_stopped", |l| l.pipeline_stopped());
        }
    }

    pub fn log(&mut self, payload: &CounterPayload) {
        for logger in self.loggers.iter_mut() {
            invoke(logger.as_mut(), "log", |l| l.log(payload));
        }
    }
}

fn invoke<F>(logger: &mut dyn Logger, operation: &str, f: F)
where
    F: FnOnce(&mut dyn Logger) -> Result<(), LoggerError>,
{
    // A logger that panicked stays registered and keeps getting payloads.
    let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *logger)));
    match result {
        Ok(Ok(())) => {},
        Ok(Err(LoggerError::Disposed)) => debug!("logger {} already disposed during {}", logger.name(), operation),
        Ok(Err(e)) => warn!("logger {} failed during {}: {}", logger.name(), operation, e),
        Err(panic) => warn!(
            "logger {} panicked during {}: {}",
            logger.name(),
            operation,
            panic_message(&*panic)
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
