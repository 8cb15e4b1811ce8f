use crate::pipeline::PipelineError;
use crossbeam_channel::Sender;

pub(crate) enum ControlMessage {
    Stop,
}

/// Handle for controlling a running pipeline from another thread.
#[derive(Clone)]
pub struct Controller {
    control_tx: Sender<ControlMessage>,
}

impl Controller {
    pub(crate) fn new(control_tx: Sender<ControlMessage>) -> Controller { Controller { control_tx } }

    /// Asks the pipeline to stop.
    ///
    /// Events still queued at that point are not decoded.  Loggers are notified that the pipeline
    /// stopped before `Pipeline::run` returns.
    pub fn stop(&self) -> Result<(), PipelineError> {
        self.control_tx
            .send(ControlMessage::Stop)
            .map_err(|_| PipelineError::Disconnected)
    }
}
