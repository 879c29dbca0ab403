use crate::{
    condition::{Condition, Operand, Selection},
    document::Document,
    hash::{ConditionId, FilterId},
    matcher,
    storage::Storage,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// `select`/`notselect`: field, then array index, to a nested storage holding
/// the filters run against that element. The element is exposed to them as
/// the `value` field.
#[derive(Debug, Default)]
pub(crate) struct SelectOperand {
    negated: bool,
    fields: HashMap<String, BTreeMap<i64, Selector>>,
}

#[derive(Debug, Default)]
struct Selector {
    storage: Storage,
    conditions: HashMap<FilterId, ConditionId>,
}

impl SelectOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        let selection = selection_of(condition);
        let selector = self
            .fields
            .entry(condition.field().to_owned())
            .or_default()
            .entry(selection.index())
            .or_default();
        selector
            .storage
            .store(selection.clauses(), selection.filter());
        selector
            .conditions
            .insert(selection.filter(), condition.id());
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let selection = selection_of(condition);
        let Some(selectors) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        let Some(selector) = selectors.get_mut(&selection.index()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        selector.conditions.remove(&selection.filter());
        if selector.storage.remove(selection.filter()) == 0 {
            selectors.remove(&selection.index());
        }
        if selectors.is_empty() {
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
        for (field, selectors) in &self.fields {
            let array = document.array(field);
            for (index, selector) in selectors {
                let element = array.and_then(|array| element(array, *index));
                let matched = element
                    .map(|element| {
                        let nested = Document::flatten(&json!({ "value": element }));
                        matcher::test(&selector.storage, &nested)
                    })
                    .unwrap_or_default();
                fired.extend(
                    selector
                        .conditions
                        .iter()
                        .filter(|(filter, _)| matched.binary_search(filter).is_ok() != self.negated)
                        .map(|(_, id)| *id),
                );
            }
        }
    }
}

/// Negative indexes count from the end of the array.
fn element(array: &[Value], index: i64) -> Option<&Value> {
    let position = if index < 0 {
        array.len().checked_sub(usize::try_from(index.unsigned_abs()).ok()?)?
    } else {
        usize::try_from(index).ok()?
    };
    array.get(position)
}

fn selection_of(condition: &Condition) -> &Selection {
    match condition.operand() {
        Operand::Select(selection) => selection,
        operand => unreachable!("select index got a {operand:?} operand. This is a bug."),
    }
}
