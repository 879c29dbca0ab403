use crate::{
    ast::Node,
    canonical::Canonicalizer,
    config::Config,
    document::Document,
    engine::{Engine, NormalizedFilter},
    error::Result,
    hash::FilterId,
};
use std::collections::HashMap;

/// Filters registered across namespaces. Each namespace gets its own
/// [`Engine`], created with its first filter and dropped with its last one.
#[derive(Debug)]
pub struct Percolator {
    config: Config,
    canonicalizer: Canonicalizer,
    engines: HashMap<String, Engine>,
    namespaces: HashMap<FilterId, String>,
}

impl Percolator {
    pub fn new(config: Config) -> Self {
        Self {
            canonicalizer: Canonicalizer::new(&config),
            config,
            engines: HashMap::new(),
            namespaces: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks that `filter` can be registered, without registering it.
    pub fn validate(&self, filter: &Node) -> Result<()> {
        self.canonicalizer.convert(filter).map(|_| ())
    }

    pub fn normalize(&self, namespace: &str, filter: &Node) -> Result<NormalizedFilter> {
        NormalizedFilter::new(&self.canonicalizer, namespace, filter)
    }

    pub fn store(&mut self, filter: NormalizedFilter) -> FilterId {
        let engine = self
            .engines
            .entry(filter.namespace().to_owned())
            .or_insert_with(|| {
                tracing::debug!(namespace = filter.namespace(), "creating namespace");
                Engine::new(filter.namespace(), &self.config)
            });
        self.namespaces
            .insert(filter.id(), filter.namespace().to_owned());
        engine.store(filter)
    }

    pub fn register(&mut self, namespace: &str, filter: &Node) -> Result<FilterId> {
        let normalized = self.normalize(namespace, filter)?;
        Ok(self.store(normalized))
    }

    /// Removes a filter from whichever namespace holds it. Returns the number
    /// of filters left across every namespace.
    pub fn remove(&mut self, id: FilterId) -> usize {
        if let Some(namespace) = self.namespaces.remove(&id) {
            let Some(engine) = self.engines.get_mut(&namespace) else {
                unreachable!("filter {id} belongs to a missing namespace. This is a bug.");
            };
            if engine.remove(id) == 0 {
                tracing::debug!(namespace = namespace.as_str(), "dropping empty namespace");
                self.engines.remove(&namespace);
            }
        }
        self.namespaces.len()
    }

    /// Filters of `namespace` that `document` satisfies. An unknown
    /// namespace matches nothing.
    pub fn test(&self, namespace: &str, document: &Document) -> Report {
        self.engines
            .get(namespace)
            .map(|engine| engine.test(document))
            .unwrap_or_default()
    }

    pub fn has(&self, id: FilterId) -> bool {
        self.namespaces.contains_key(&id)
    }

    pub fn filter_ids(&self, namespace: &str) -> Vec<FilterId> {
        self.engines
            .get(namespace)
            .map(Engine::filter_ids)
            .unwrap_or_default()
    }

    /// Namespaces holding at least one filter, sorted.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        namespaces.sort_unstable();
        namespaces
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl Default for Percolator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Ids of the filters a document matched, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    filters: Vec<FilterId>,
}

impl Report {
    pub(crate) fn new(filters: Vec<FilterId>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &[FilterId] {
        &self.filters
    }

    pub fn contains(&self, id: FilterId) -> bool {
        self.filters.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl IntoIterator for Report {
    type Item = FilterId;
    type IntoIter = std::vec::IntoIter<FilterId>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.into_iter()
    }
}
