use crate::{
    condition::{Condition, Operand},
    document::Document,
    hash::ConditionId,
    predicates::Scalar,
};
use std::collections::HashMap;

/// `exists`/`notexists`. Presence tests and "array contains" tests on the
/// same field are kept apart.
#[derive(Debug, Default)]
pub(crate) struct ExistsOperand {
    negated: bool,
    fields: HashMap<String, ExistsField>,
}

#[derive(Debug, Default)]
struct ExistsField {
    direct: Option<ConditionId>,
    values: HashMap<Scalar, ConditionId>,
}

impl ExistsField {
    fn is_empty(&self) -> bool {
        self.direct.is_none() && self.values.is_empty()
    }
}

impl ExistsOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        let entry = self.fields.entry(condition.field().to_owned()).or_default();
        match value_of(condition) {
            None => entry.direct = Some(condition.id()),
            Some(value) => {
                entry.values.insert(value.clone(), condition.id());
            }
        }
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(entry) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        match value_of(condition) {
            None => entry.direct = None,
            Some(value) => {
                entry.values.remove(value);
            }
        }
        if entry.is_empty() {
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
            let present = document.get(field).is_some();
            if let Some(id) = entry.direct {
                if present != self.negated {
                    fired.push(id);
                }
            }
            if entry.values.is_empty() {
                continue;
            }

            let elements: Vec<Scalar> = document
                .array(field)
                .unwrap_or_default()
                .iter()
                .filter_map(Scalar::from_value)
                .collect();
            if self.negated {
                fired.extend(
                    entry
                        .values
                        .iter()
                        .filter(|(value, _)| !elements.contains(value))
                        .map(|(_, id)| *id),
                );
            } else {
                fired.extend(elements.iter().filter_map(|element| entry.values.get(element)));
            }
        }
    }
}

fn value_of(condition: &Condition) -> Option<&Scalar> {
    match condition.operand() {
        Operand::Exists(value) => value.as_ref(),
        operand => unreachable!("existence index got a {operand:?} operand. This is a bug."),
    }
}
