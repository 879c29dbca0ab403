use crate::{
    condition::{Condition, Operand},
    document::Document,
    hash::ConditionId,
    predicates::Scalar,
};
use std::collections::HashMap;

/// `equals`/`notequals`: field, then value, to the condition testing it.
#[derive(Debug, Default)]
pub(crate) struct EqualsOperand {
    negated: bool,
    fields: HashMap<String, HashMap<Scalar, ConditionId>>,
}

impl EqualsOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        self.fields
            .entry(condition.field().to_owned())
            .or_default()
            .insert(value_of(condition).clone(), condition.id());
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(values) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        values.remove(value_of(condition));
        if values.is_empty() {
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
        for (field, values) in &self.fields {
            let actual = document.scalar(field);
            if self.negated {
                fired.extend(
                    values
                        .iter()
                        .filter(|(value, _)| actual.as_ref() != Some(*value))
                        .map(|(_, id)| *id),
                );
            } else if let Some(id) = actual.and_then(|actual| values.get(&actual)) {
                fired.push(*id);
            }
        }
    }
}

fn value_of(condition: &Condition) -> &Scalar {
    match condition.operand() {
        Operand::Value(value) => value,
        operand => unreachable!("equality index got a {operand:?} operand. This is a bug."),
    }
}
