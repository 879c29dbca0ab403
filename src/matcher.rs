use crate::{
    document::Document,
    hash::{ConditionId, FilterId, SubfilterId},
    storage::Storage,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Per-pass countdown of the conditions each subfilter still waits for.
/// Subfilters are only tracked once one of their conditions fired.
struct TestTables<'a> {
    storage: &'a Storage,
    remaining: HashMap<SubfilterId, usize>,
    seen: HashSet<ConditionId>,
    matched: BTreeSet<FilterId>,
}

impl<'a> TestTables<'a> {
    fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            remaining: HashMap::new(),
            seen: HashSet::new(),
            matched: BTreeSet::new(),
        }
    }

    fn fire(&mut self, condition: ConditionId) {
        if !self.seen.insert(condition) {
            return;
        }
        let storage = self.storage;
        for subfilter in storage.subfilters_of(condition) {
            let entry = storage.subfilter(*subfilter);
            let remaining = self
                .remaining
                .entry(*subfilter)
                .or_insert_with(|| entry.condition_count());
            *remaining -= 1;
            if *remaining == 0 {
                self.matched.extend(entry.filters());
            }
        }
    }
}

/// Ids of the stored filters `document` satisfies, in ascending order.
pub(crate) fn test(storage: &Storage, document: &Document) -> Vec<FilterId> {
    let fired = storage.operands().test(document);
    let mut tables = TestTables::new(storage);
    for condition in &fired {
        tables.fire(*condition);
    }

    tracing::trace!(
        fired = tables.seen.len(),
        subfilters = tables.remaining.len(),
        matched = tables.matched.len(),
        "tested document"
    );
    tables.matched.into_iter().collect()
}
