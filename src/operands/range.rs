use super::interval_tree::IntervalTree;
use crate::{
    condition::{Bounds, Condition, Operand},
    document::Document,
    hash::ConditionId,
};
use std::collections::HashMap;

/// `range`/`notrange`, one interval tree per field. A `notrange` condition is
/// stored as the intervals flanking its excluded range.
#[derive(Debug, Default)]
pub(crate) struct RangeOperand {
    negated: bool,
    fields: HashMap<String, RangeField>,
}

#[derive(Debug, Default)]
struct RangeField {
    conditions: HashMap<ConditionId, Vec<(f64, f64)>>,
    tree: IntervalTree<ConditionId>,
}

impl RangeOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    fn intervals(&self, bounds: &Bounds) -> Vec<(f64, f64)> {
        if self.negated {
            bounds.complement()
        } else {
            vec![bounds.interval()]
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        let intervals = self.intervals(bounds_of(condition));
        let entry = self.fields.entry(condition.field().to_owned()).or_default();
        for (low, high) in &intervals {
            entry.tree.insert(*low, *high, condition.id());
        }
        entry.conditions.insert(condition.id(), intervals);
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(entry) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        let Some(intervals) = entry.conditions.remove(&condition.id()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        for (low, high) in intervals {
            entry.tree.remove(low, high, condition.id());
        }
        if entry.conditions.is_empty() {
            self.fields.remove(condition.field());
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub(crate) fn test(&self, document: &Document, fired: &mut Vec<ConditionId>) {
        for (field, entry) in &self.fields {
            match document.number(field) {
                Some(value) => entry.tree.stab(value, &mut |id| fired.push(id)),
                None if self.negated => fired.extend(entry.conditions.keys()),
                None => {}
            }
        }
    }
}

fn bounds_of(condition: &Condition) -> &Bounds {
    match condition.operand() {
        Operand::Range(bounds) => bounds,
        operand => unreachable!("range index got a {operand:?} operand. This is a bug."),
    }
}
