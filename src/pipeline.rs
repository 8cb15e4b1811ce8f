use crate::{
    configuration::Configuration,
    control::{ControlMessage, Controller},
    decoder::{Decision, Decoder},
    dispatch::Dispatcher,
    event::RawEvent,
    sink::EventSink,
};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, info};
use std::fmt;
use thiserror::Error;

/// Lifecycle of a pipeline.
///
/// A pipeline only ever moves forward: `Created`, `Started`, `Running` once the first event has
/// been processed, and finally `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Started,
    Running,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PipelineState::Created => "created",
            PipelineState::Started => "started",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors when driving a pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline is {actual}, expected it to be {expected}")]
    InvalidState {
        expected: PipelineState,
        actual: PipelineState,
    },

    /// The pipeline has already gone away.
    #[error("pipeline is no longer running")]
    Disconnected,
}

struct Core {
    state: PipelineState,
    decoder: Decoder,
    dispatcher: Dispatcher,
}

impl Core {
    fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Created {
            return Err(PipelineError::InvalidState {
                expected: PipelineState::Created,
                actual: self.state,
            });
        }

        self.dispatcher.started();
        self.state = PipelineState::Started;
        info!(
            "counter pipeline started for session '{}' with {} logger(s)",
            self.decoder.context().session_id,
            self.dispatcher.len()
        );
        Ok(())
    }

    fn process(&mut self, event: &RawEvent) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Started => self.state = PipelineState::Running,
            PipelineState::Running => {},
            actual => {
                return Err(PipelineError::InvalidState {
                    expected: PipelineState::Running,
                    actual,
                })
            },
        }

        match self.decoder.decode(event) {
            Ok(Decision::Emit(payload)) => self.dispatcher.log(&payload),
            Ok(Decision::Suppress) => {},
            Err(e) => debug!("dropping malformed {} event from {}: {}", event.name, event.provider, e),
        }
        Ok(())
    }

    fn stop(&mut self) {
        match self.state {
            PipelineState::Stopped => {},
            PipelineState::Created => self.state = PipelineState::Stopped,
            PipelineState::Started | PipelineState::Running => {
                self.dispatcher.stopped();
                self.state = PipelineState::Stopped;
                info!(
                    "counter pipeline stopped for session '{}'",
                    self.decoder.context().session_id
                );
            },
        }
    }
}

// Loggers that were told the pipeline started are always told it stopped, even when a manually
// driven pipeline is dropped without calling `stop`.
impl Drop for Core {
    fn drop(&mut self) { self.stop() }
}

/// Decodes the raw events of one diagnostic session and hands the payloads to its loggers.
///
/// A pipeline can be driven directly through `start`, `process` and `stop`, or moved onto its own
/// thread with `run`, in which case events arrive through `EventSink`s and the pipeline is stopped
/// through a `Controller`.
pub struct Pipeline {
    core: Core,

    data_tx: Sender<RawEvent>,
    data_rx: Receiver<RawEvent>,
    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
}

impl Pipeline {
    pub(crate) fn from_config(conf: Configuration) -> Pipeline {
        let (data_tx, data_rx) = bounded(conf.capacity);
        let (control_tx, control_rx) = bounded(16);

        Pipeline {
            core: Core {
                state: PipelineState::Created,
                decoder: Decoder::new(conf.filter, conf.context),
                dispatcher: Dispatcher::new(conf.loggers),
            },
            data_tx,
            data_rx,
            control_tx,
            control_rx,
        }
    }

    /// Gets a builder to configure a `Pipeline` instance with.
    pub fn builder() -> Configuration { Configuration::default() }

    /// Creates an `EventSink` bound to this pipeline.
    pub fn get_sink(&self) -> EventSink { EventSink::new(self.data_tx.clone()) }

    /// Creates a `Controller` bound to this pipeline.
    pub fn get_controller(&self) -> Controller { Controller::new(self.control_tx.clone()) }

    pub fn state(&self) -> PipelineState { self.core.state }

    pub fn decoder(&self) -> &Decoder { &self.core.decoder }

    /// Notifies every logger that the pipeline is starting.
    ///
    /// Loggers are notified that the pipeline stopped when `stop` is called, when `run` returns, or
    /// when the pipeline is dropped, whichever comes first.
    pub fn start(&mut self) -> Result<(), PipelineError> { self.core.start() }

    /// Decodes a single event and delivers the resulting payload, if any, to every logger.
    ///
    /// Malformed events are logged and dropped.  Fails only if the pipeline was never started or
    /// has already stopped.
    pub fn process(&mut self, event: &RawEvent) -> Result<(), PipelineError> { self.core.process(event) }

    /// Notifies every logger that the pipeline stopped.  Stopping twice does nothing.
    pub fn stop(&mut self) { self.core.stop() }

    /// Runs the pipeline until it is stopped.
    ///
    /// Starts the pipeline unless it was already started, then processes events from its sinks until either a `Controller` asks
    /// it to stop or every `EventSink` has been dropped.
    pub fn run(self) -> Result<(), PipelineError> {
        let Pipeline {
            mut core,
            data_tx,
            data_rx,
            control_tx,
            control_rx,
        } = self;

        // The pipeline's own sender would keep the data channel open forever.
        drop(data_tx);
        let _control_tx = control_tx;

        match core.state {
            PipelineState::Created => core.start()?,
            PipelineState::Started | PipelineState::Running => {},
            actual => {
                return Err(PipelineError::InvalidState {
                    expected: PipelineState::Created,
                    actual,
                })
            },
        }

        loop {
            select! {
                recv(control_rx) -> msg => match msg {
                    Ok(ControlMessage::Stop) | Err(_) => break,
                },
                recv(data_rx) -> msg => match msg {
                    Ok(event) => core.process(&event)?,
                    Err(_) => {
                        debug!("every event sink was dropped");
                        break;
                    },
                },
            }
        }

        core.stop();
        Ok(())
    }
}
