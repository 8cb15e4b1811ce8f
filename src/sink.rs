use crate::event::RawEvent;
use crossbeam_channel::Sender;
use thiserror::Error;

/// Errors when feeding events into a pipeline.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The pipeline has stopped and is no longer receiving events.
    #[error("pipeline is no longer receiving events")]
    Disconnected(RawEvent),
}

/// Handle for sending raw events into a running pipeline.
///
/// `EventSink` is cloneable, so the transport can hand events over from any thread.  The pipeline
/// runs until it is stopped through its `Controller`, or until every sink has been dropped, which
/// is how the end of the diagnostic session is signalled.
#[derive(Clone)]
pub struct EventSink {
    data_tx: Sender<RawEvent>,
}

impl EventSink {
    pub(crate) fn new(data_tx: Sender<RawEvent>) -> EventSink { EventSink { data_tx } }

    /// Sends a raw event to the pipeline.
    ///
    /// Blocks while the pipeline's queue is full, so a slow pipeline throttles the transport.  The
    /// event is handed back if the pipeline has stopped.
    pub fn send(&self, event: RawEvent) -> Result<(), SinkError> {
        self.data_tx.send(event).map_err(|e| SinkError::Disconnected(e.into_inner()))
    }
}
