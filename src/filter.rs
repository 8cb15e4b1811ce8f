use crate::helper::fold_case;
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use std::time::Duration;

/// Decides which providers and counters a pipeline is interested in.
///
/// Providers are matched case-insensitively, counters case-sensitively.  A provider registered
/// without counters enables all of its counters.
///
/// The legacy protocol multiplexes concurrent collection requests by having the target process
/// report at the lowest interval any of them asked for, so legacy samples are additionally
/// required to match the configured refresh interval exactly.  Samples meant for a faster-polling
/// consumer are dropped rather than resampled.
#[derive(Clone, Debug)]
pub struct CounterFilter {
    interval: Duration,
    interval_ms: i64,
    accept_all: bool,
    enabled: HashMap<String, Enabled, FnvBuildHasher>,
}

#[derive(Clone, Debug)]
struct Enabled {
    name: String,
    counters: Vec<String>,
}

impl CounterFilter {
    /// Creates a filter with an empty allow-list.
    ///
    /// Until providers are added, the legacy predicate accepts every counter, matching what the
    /// wire protocol has always done, while the meter predicate accepts nothing.  Use
    /// [`CounterFilter::all_counters`] to accept everything under both protocols.
    pub fn new(interval: Duration) -> CounterFilter {
        CounterFilter {
            interval,
            interval_ms: interval.as_millis() as i64,
            accept_all: false,
            enabled: HashMap::default(),
        }
    }

    /// Creates a filter that accepts every provider and counter.
    pub fn all_counters(interval: Duration) -> CounterFilter {
        let mut filter = CounterFilter::new(interval);
        filter.accept_all = true;
        filter
    }

    /// Enables every counter of the given provider.
    pub fn provider(self, provider: &str) -> Self { self.counters(provider, Vec::<String>::new()) }

    /// Enables the given counters of the given provider.
    ///
    /// Registering a provider again replaces its previous allow-list.  An empty list enables every
    /// counter of the provider.
    pub fn counters<I, S>(mut self, provider: &str, counters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = Enabled {
            name: provider.to_owned(),
            counters: counters.into_iter().map(Into::into).collect(),
        };
        self.enabled.insert(fold_case(provider), entry);
        self
    }

    /// The configured refresh interval.
    pub fn interval(&self) -> Duration { self.interval }

    /// The configured refresh interval, in fractional seconds.
    pub fn interval_secs(&self) -> f64 { self.interval.as_secs_f64() }

    /// Whether this filter was built to accept every provider and counter.
    pub fn accepts_all(&self) -> bool { self.accept_all }

    /// Names of the registered providers, as they were given.
    pub fn providers(&self) -> impl Iterator<Item = &str> { self.enabled.values().map(|e| e.name.as_str()) }

    /// Whether a legacy counter sample reported at `interval_ms` is in scope.
    pub fn is_included_legacy(&self, provider: &str, counter: &str, interval_ms: i64) -> bool {
        if interval_ms != self.interval_ms {
            return false;
        }

        if self.accept_all || self.enabled.is_empty() {
            return true;
        }

        self.is_enabled(provider, counter)
    }

    /// Whether a metrics-protocol instrument is in scope.
    pub fn is_included_meter(&self, meter: &str, instrument: &str) -> bool {
        if self.accept_all {
            return true;
        }

        self.is_enabled(meter, instrument)
    }

    fn is_enabled(&self, provider: &str, counter: &str) -> bool {
        match self.enabled.get(&fold_case(provider)) {
            Some(entry) => entry.counters.is_empty() || entry.counters.iter().any(|c| c == counter),
            None => false,
        }
    }
}

impl Default for CounterFilter {
    fn default() -> CounterFilter { CounterFilter::all_counters(Duration::from_secs(1)) }
}

#[cfg(test)]
mod tests {
    use super::CounterFilter;
    use std::time::Duration;

    #[test]
    fn test_legacy_interval_must_match() {
        let filter = CounterFilter::new(Duration::from_millis(1000));
        assert!(filter.is_included_legacy("System.Runtime", "cpu-usage", 1000));

        let filter = CounterFilter::new(Duration::from_millis(500));
        assert!(!filter.is_included_legacy("System.Runtime", "cpu-usage", 1000));

        let filter = CounterFilter::all_counters(Duration::from_secs(1));
        assert!(!filter.is_included_legacy("System.Runtime", "cpu-usage", 500));
        assert!(!filter.is_included_legacy("System.Runtime", "cpu-usage", 0));
    }

    #[test]
    fn test_provider_matching() {
        let filter = CounterFilter::new(Duration::from_secs(1))
            .provider("System.Runtime")
            .counters("Microsoft.AspNetCore.Hosting", vec!["requests-per-second"]);

        assert!(filter.is_included_legacy("system.runtime", "gc-heap-size", 1000));
        assert!(filter.is_included_legacy("Microsoft.AspNetCore.Hosting", "requests-per-second", 1000));
        assert!(!filter.is_included_legacy("Microsoft.AspNetCore.Hosting", "Requests-Per-Second", 1000));
        assert!(!filter.is_included_legacy("Microsoft.AspNetCore.Hosting", "total-requests", 1000));
        assert!(!filter.is_included_legacy("System.Net.Http", "requests-started", 1000));
    }

    #[test]
    fn test_meter_matching() {
        let filter = CounterFilter::new(Duration::from_secs(1)).counters("MyMeter", vec!["requests", "latency"]);

        assert!(filter.is_included_meter("mymeter", "latency"));
        assert!(!filter.is_included_meter("MyMeter", "errors"));
        assert!(!filter.is_included_meter("OtherMeter", "requests"));
    }

    #[test]
    fn test_empty_configuration() {
        let filter = CounterFilter::new(Duration::from_secs(1));
        assert!(filter.is_included_legacy("Anything", "anything", 1000));
        assert!(!filter.is_included_meter("Anything", "anything"));

        let filter = CounterFilter::all_counters(Duration::from_secs(1));
        assert!(filter.accepts_all());
        assert!(filter.is_included_meter("Anything", "anything"));
    }

    #[test]
    fn test_reregistering_replaces() {
        let filter = CounterFilter::new(Duration::from_secs(1))
            .counters("MyMeter", vec!["requests"])
            .provider("MYMETER");

        assert!(filter.is_included_meter("MyMeter", "latency"));
        assert_eq!(filter.providers().collect::<Vec<_>>(), vec!["MYMETER"]);
    }

    #[test]
    fn test_interval_accessors() {
        let filter = CounterFilter::new(Duration::from_millis(2500));
        assert_eq!(filter.interval(), Duration::from_millis(2500));
        assert_eq!(filter.interval_secs(), 2.5);
    }
}
