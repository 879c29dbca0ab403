use crate::{
    ast::Node,
    canonical::Canonicalizer,
    condition::{Clause, Keyword},
    config::Config,
    document::Document,
    error::Result,
    hash::FilterId,
    matcher,
    percolator::Report,
    storage::Storage,
};

/// A filter reduced to its canonical clauses, ready to be stored.
#[derive(Debug, Clone)]
pub struct NormalizedFilter {
    id: FilterId,
    namespace: String,
    clauses: Vec<Clause>,
}

impl NormalizedFilter {
    pub(crate) fn new(
        canonicalizer: &Canonicalizer,
        namespace: &str,
        filter: &Node,
    ) -> Result<Self> {
        let clauses = canonicalizer.convert(filter)?;
        Ok(Self {
            id: canonicalizer.filter_id(namespace, &clauses),
            namespace: namespace.to_owned(),
            clauses,
        })
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Filters of a single namespace.
#[derive(Debug)]
pub struct Engine {
    namespace: String,
    canonicalizer: Canonicalizer,
    storage: Storage,
}

impl Engine {
    pub fn new(namespace: impl Into<String>, config: &Config) -> Self {
        Self {
            namespace: namespace.into(),
            canonicalizer: Canonicalizer::new(config),
            storage: Storage::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Canonicalizes `filter` without storing it.
    pub fn normalize(&self, filter: &Node) -> Result<NormalizedFilter> {
        NormalizedFilter::new(&self.canonicalizer, &self.namespace, filter)
    }

    /// Stores a filter normalized for this engine's namespace.
    pub fn store(&mut self, filter: NormalizedFilter) -> FilterId {
        debug_assert_eq!(
            self.namespace, filter.namespace,
            "filter {} was normalized for another namespace",
            filter.id
        );
        self.storage.store(&filter.clauses, filter.id)
    }

    pub fn register(&mut self, filter: &Node) -> Result<FilterId> {
        let normalized = self.normalize(filter)?;
        Ok(self.store(normalized))
    }

    /// Returns the number of filters left.
    pub fn remove(&mut self, id: FilterId) -> usize {
        self.storage.remove(id)
    }

    pub fn test(&self, document: &Document) -> Report {
        Report::new(matcher::test(&self.storage, document))
    }

    pub fn has(&self, id: FilterId) -> bool {
        self.storage.has(id)
    }

    /// Whether at least one stored condition of kind `keyword` tests `field`.
    pub fn is_indexed(&self, keyword: Keyword, field: &str) -> bool {
        self.storage.operands().is_indexed(keyword, field)
    }

    /// Stored filter ids, in ascending order.
    pub fn filter_ids(&self) -> Vec<FilterId> {
        let mut ids: Vec<FilterId> = self.storage.filter_ids().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
