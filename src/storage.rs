//! The Filter → Subfilter → Condition graph.
//!
//! The three node kinds live in flat tables keyed by their content hash.
//! Back-reference sets stand in for reference counts: a subfilter lives as
//! long as one filter references it, a condition as long as one subfilter
//! does. Only the creation and destruction of a condition touch the
//! per-keyword indexes.

use crate::{
    condition::{Clause, Condition},
    hash::{ConditionId, FilterId, SubfilterId},
    operands::Operands,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct FilterEntry {
    subfilters: Vec<SubfilterId>,
}

#[derive(Debug)]
pub(crate) struct SubfilterEntry {
    filters: HashSet<FilterId>,
    conditions: Vec<ConditionId>,
}

impl SubfilterEntry {
    pub(crate) fn filters(&self) -> &HashSet<FilterId> {
        &self.filters
    }

    pub(crate) fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

#[derive(Debug)]
struct ConditionEntry {
    condition: Condition,
    subfilters: HashSet<SubfilterId>,
}

#[derive(Debug, Default)]
pub(crate) struct Storage {
    filters: HashMap<FilterId, FilterEntry>,
    subfilters: HashMap<SubfilterId, SubfilterEntry>,
    conditions: HashMap<ConditionId, ConditionEntry>,
    operands: Operands,
}

impl Storage {
    /// Stores a canonical filter under `id`. Storing an id twice is a no-op.
    pub(crate) fn store(&mut self, clauses: &[Clause], id: FilterId) -> FilterId {
        if self.filters.contains_key(&id) {
            return id;
        }

        let mut created = 0;
        for clause in clauses {
            if let Some(subfilter) = self.subfilters.get_mut(&clause.id()) {
                subfilter.filters.insert(id);
                continue;
            }

            for condition in clause.conditions() {
                let entry = self
                    .conditions
                    .entry(condition.id())
                    .or_insert_with(|| {
                        created += 1;
                        self.operands.insert(condition);
                        ConditionEntry {
                            condition: condition.clone(),
                            subfilters: HashSet::new(),
                        }
                    });
                entry.subfilters.insert(clause.id());
            }
            self.subfilters.insert(
                clause.id(),
                SubfilterEntry {
                    filters: HashSet::from([id]),
                    conditions: clause.conditions().iter().map(Condition::id).collect(),
                },
            );
        }
        self.filters.insert(
            id,
            FilterEntry {
                subfilters: clauses.iter().map(Clause::id).collect(),
            },
        );

        tracing::debug!(
            filter = %id,
            subfilters = clauses.len(),
            new_conditions = created,
            "stored filter"
        );
        id
    }

    /// Removes a filter and everything only it was referencing. Returns how
    /// many filters remain; unknown ids are ignored.
    pub(crate) fn remove(&mut self, id: FilterId) -> usize {
        let Some(filter) = self.filters.remove(&id) else {
            return self.filters.len();
        };

        let mut dropped = 0;
        for subfilter_id in filter.subfilters {
            let Some(subfilter) = self.subfilters.get_mut(&subfilter_id) else {
                unreachable!("filter {id} references a missing subfilter. This is a bug.");
            };
            subfilter.filters.remove(&id);
            if !subfilter.filters.is_empty() {
                continue;
            }

            let Some(subfilter) = self.subfilters.remove(&subfilter_id) else {
                unreachable!("subfilter vanished during removal. This is a bug.");
            };
            for condition_id in subfilter.conditions {
                let Some(entry) = self.conditions.get_mut(&condition_id) else {
                    unreachable!("subfilter references a missing condition. This is a bug.");
                };
                entry.subfilters.remove(&subfilter_id);
                if entry.subfilters.is_empty() {
                    if let Some(entry) = self.conditions.remove(&condition_id) {
                        self.operands.remove(&entry.condition);
                        dropped += 1;
                    }
                }
            }
        }

        tracing::debug!(filter = %id, dropped_conditions = dropped, "removed filter");
        self.filters.len()
    }

    pub(crate) fn has(&self, id: FilterId) -> bool {
        self.filters.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.filters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub(crate) fn filter_ids(&self) -> impl Iterator<Item = FilterId> + '_ {
        self.filters.keys().copied()
    }

    pub(crate) fn operands(&self) -> &Operands {
        &self.operands
    }

    pub(crate) fn subfilter(&self, id: SubfilterId) -> &SubfilterEntry {
        let Some(subfilter) = self.subfilters.get(&id) else {
            unreachable!("a condition references a missing subfilter. This is a bug.");
        };
        subfilter
    }

    /// Subfilters containing the condition `id`.
    pub(crate) fn subfilters_of(&self, id: ConditionId) -> &HashSet<SubfilterId> {
        let Some(entry) = self.conditions.get(&id) else {
            unreachable!("an index holds a condition missing from the graph. This is a bug.");
        };
        &entry.subfilters
    }

    #[cfg(test)]
    pub(crate) fn subfilter_count(&self) -> usize {
        self.subfilters.len()
    }

    #[cfg(test)]
    pub(crate) fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Node,
        canonical::Canonicalizer,
        condition::Keyword,
        config::Config,
        predicates::{Predicate, RangeBounds, Shape},
    };
    use serde_json::json;

    fn store(storage: &mut Storage, filter: Node) -> FilterId {
        let canonicalizer = Canonicalizer::new(&Config::default());
        let clauses = canonicalizer.convert(&filter).unwrap();
        let id = canonicalizer.filter_id("", &clauses);
        storage.store(&clauses, id)
    }

    fn eq(field: &str, value: &str) -> Node {
        Predicate::equals(field, value).into()
    }

    #[test]
    fn storing_a_filter_twice_is_idempotent() {
        let mut storage = Storage::default();
        let filter = Node::or(vec![eq("foo", "bar"), eq("baz", "qux")]);

        let first = store(&mut storage, filter.clone());
        let second = store(&mut storage, filter);

        assert_eq!(first, second);
        assert_eq!(1, storage.len());
        assert_eq!(2, storage.subfilter_count());
        assert_eq!(2, storage.condition_count());
    }

    #[test]
    fn identical_clauses_share_one_subfilter() {
        let mut storage = Storage::default();

        let a = store(&mut storage, eq("foo", "bar"));
        let b = store(
            &mut storage,
            Node::or(vec![eq("foo", "bar"), eq("baz", "qux")]),
        );

        assert_ne!(a, b);
        assert_eq!(2, storage.len());
        assert_eq!(2, storage.subfilter_count());
        assert_eq!(2, storage.condition_count());
    }

    #[test]
    fn identical_conditions_share_one_condition() {
        let mut storage = Storage::default();

        store(&mut storage, eq("foo", "bar"));
        store(
            &mut storage,
            Node::and(vec![eq("foo", "bar"), eq("baz", "qux")]),
        );

        assert_eq!(2, storage.subfilter_count());
        assert_eq!(2, storage.condition_count());
    }

    #[test]
    fn removing_a_filter_keeps_what_others_still_use() {
        let mut storage = Storage::default();
        let shared = store(&mut storage, eq("foo", "bar"));
        let other = store(
            &mut storage,
            Node::and(vec![eq("foo", "bar"), eq("baz", "qux")]),
        );

        assert_eq!(1, storage.remove(other));

        assert!(storage.has(shared));
        assert!(!storage.has(other));
        assert_eq!(1, storage.subfilter_count());
        assert_eq!(1, storage.condition_count());
        assert!(storage.operands().is_indexed(Keyword::Equals, "foo"));
        assert!(!storage.operands().is_indexed(Keyword::Equals, "baz"));
    }

    #[test]
    fn removing_the_last_filter_empties_the_indexes() {
        let mut storage = Storage::default();
        let a = store(&mut storage, eq("foo", "bar"));
        let b = store(
            &mut storage,
            Node::or(vec![eq("foo", "bar"), Node::not(eq("baz", "qux"))]),
        );

        assert_eq!(1, storage.remove(a));
        assert!(storage.operands().is_indexed(Keyword::Equals, "foo"));

        assert_eq!(0, storage.remove(b));
        assert!(storage.is_empty());
        assert_eq!(0, storage.subfilter_count());
        assert_eq!(0, storage.condition_count());
        assert!(storage.operands().is_empty());
    }

    #[test]
    fn removing_an_unknown_filter_is_a_no_op() {
        let mut storage = Storage::default();
        store(&mut storage, eq("foo", "bar"));

        assert_eq!(1, storage.remove(FilterId::from(42)));
        assert_eq!(1, storage.len());
    }

    #[test]
    fn removing_filters_of_every_kind_empties_the_indexes() {
        let mut storage = Storage::default();
        let range: Node = Predicate::range("d", RangeBounds::new().gt(42.0).lt(110.0)).into();
        let filters = vec![
            Node::and(vec![eq("a", "x"), Node::not(Predicate::exists("c").into())]),
            Node::or(vec![range.clone(), Predicate::regexp("e", "^foo", "").into()]),
            Node::and(vec![
                Node::not(range),
                Predicate::matches("g", json!({"h": [1, 2]})).into(),
            ]),
            Node::not(
                Predicate::geospatial(
                    "f",
                    Shape::Circle {
                        lat: 10.0,
                        lon: 10.0,
                        radius: 1_000.0,
                    },
                )
                .into(),
            ),
            Predicate::select("i", 0, Node::not(eq("value", "y"))).into(),
        ];
        let ids: Vec<FilterId> = filters
            .into_iter()
            .map(|filter| store(&mut storage, filter))
            .collect();

        assert!(storage.operands().is_indexed(Keyword::NotRange, "d"));
        assert!(storage.operands().is_indexed(Keyword::Select, "i"));

        for id in ids.into_iter().rev() {
            storage.remove(id);
        }

        assert!(storage.is_empty());
        assert_eq!(0, storage.subfilter_count());
        assert_eq!(0, storage.condition_count());
        for (keyword, field) in [
            (Keyword::Equals, "a"),
            (Keyword::NotExists, "c"),
            (Keyword::Range, "d"),
            (Keyword::NotRange, "d"),
            (Keyword::Regexp, "e"),
            (Keyword::NotGeospatial, "f"),
            (Keyword::Match, "g"),
            (Keyword::Select, "i"),
        ] {
            assert!(!storage.operands().is_indexed(keyword, field), "{keyword:?} on {field}");
        }
        assert!(storage.operands().is_empty());
    }
}
