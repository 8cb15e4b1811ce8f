use crate::{decoder::SessionContext, dispatch::Logger, filter::CounterFilter, pipeline::Pipeline};

/// A configuration builder for `Pipeline`.
pub struct Configuration {
    pub(crate) filter: CounterFilter,
    pub(crate) context: SessionContext,
    pub(crate) capacity: usize,
    pub(crate) loggers: Vec<Box<dyn Logger>>,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            filter: CounterFilter::default(),
            context: SessionContext::default(),
            capacity: 1024,
            loggers: Vec::new(),
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration { Default::default() }

    /// Sets the session identifier.
    ///
    /// Defaults to an empty string.
    ///
    /// Every metrics-protocol message carries the identifier of the collection session it belongs
    /// to, and messages for any other session are ignored.  This must match the identifier the
    /// session layer used when enabling the event source.
    pub fn session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.context.session_id = session_id.into();
        self
    }

    /// Sets the client identifier.
    ///
    /// Defaults to none.
    ///
    /// Only used to pick out shared-session configuration errors, which the target process keys
    /// by client rather than by session.
    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.context.client_id = Some(client_id.into());
        self
    }

    /// Sets the counter filter.
    ///
    /// Defaults to accepting every counter at a one second refresh interval.
    pub fn filter(mut self, filter: CounterFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the histogram limit the session was started with.
    ///
    /// Defaults to `10`.  Only used in the error reported when the limit is reached.
    pub fn max_histograms(mut self, max_histograms: u32) -> Self {
        self.context.max_histograms = max_histograms;
        self
    }

    /// Sets the time series limit the session was started with.
    ///
    /// Defaults to `1000`.  Only used in the error reported when the limit is reached.
    pub fn max_time_series(mut self, max_time_series: u32) -> Self {
        self.context.max_time_series = max_time_series;
        self
    }

    /// Sets whether counters should report their cumulative value alongside their rate.
    ///
    /// Defaults to `false`.
    pub fn use_counter_rate_and_value(mut self, enabled: bool) -> Self {
        self.context.use_counter_rate_and_value = enabled;
        self
    }

    /// Sets the event queue capacity.
    ///
    /// Defaults to `1024`.
    ///
    /// This controls how many raw events can be waiting to be decoded before `EventSink::send`
    /// blocks.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Adds a logger.
    ///
    /// Loggers are called in the order they were added.
    pub fn logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    /// Create a `Pipeline` based on this configuration.
    pub fn build(self) -> Pipeline { Pipeline::from_config(self) }
}
