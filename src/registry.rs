use crate::{data::CounterMetadata, helper::fold_case};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use std::sync::Arc;

/// Interning cache for instrument identities.
///
/// Keys are the provider name, compared case-insensitively, and the counter name, compared
/// case-sensitively.  The first observation of a pair wins: later lookups return the cached
/// record even when they carry different tags, since the protocol does not guarantee tags are
/// stable from one message to the next.  There is no eviction.
#[derive(Default)]
pub struct CounterMetadataRegistry {
    data: HashMap<(String, String), Arc<CounterMetadata>, FnvBuildHasher>,
}

impl CounterMetadataRegistry {
    pub fn new() -> CounterMetadataRegistry { Default::default() }

    /// Gets the metadata for the given pair, creating it from the given tags if it's not known yet.
    pub fn get_or_create(
        &mut self, provider: &str, counter: &str, meter_tags: Option<&str>, instrument_tags: Option<&str>,
        scope_hash: Option<&str>,
    ) -> Arc<CounterMetadata> {
        let key = (fold_case(provider), counter.to_owned());
        let entry = self.data.entry(key).or_insert_with(|| {
            Arc::new(CounterMetadata {
                provider_name: provider.to_owned(),
                counter_name: counter.to_owned(),
                meter_tags: meter_tags.map(str::to_owned),
                instrument_tags: instrument_tags.map(str::to_owned),
                scope_hash: scope_hash.map(str::to_owned),
            })
        });

        Arc::clone(entry)
    }

    /// Gets the metadata for the given pair, if it has been observed.
    pub fn get(&self, provider: &str, counter: &str) -> Option<&Arc<CounterMetadata>> {
        self.data.get(&(fold_case(provider), counter.to_owned()))
    }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}
