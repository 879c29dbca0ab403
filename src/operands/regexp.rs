use crate::{
    condition::{Condition, Operand, Pattern},
    document::Document,
    hash::ConditionId,
};
use std::collections::HashMap;

/// `regexp`/`notregexp`: field, then pattern source and flags, to the
/// compiled pattern. Only string values can match.
#[derive(Debug, Default)]
pub(crate) struct RegexpOperand {
    negated: bool,
    fields: HashMap<String, HashMap<String, (ConditionId, Pattern)>>,
}

impl RegexpOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        let pattern = pattern_of(condition);
        self.fields
            .entry(condition.field().to_owned())
            .or_default()
            .insert(pattern.key(), (condition.id(), pattern.clone()));
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(patterns) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        patterns.remove(&pattern_of(condition).key());
        if patterns.is_empty() {
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
        for (field, patterns) in &self.fields {
            let value = document.string(field);
            fired.extend(
                patterns
                    .values()
                    .filter(|(_, pattern)| {
                        value.is_some_and(|value| pattern.is_match(value)) != self.negated
                    })
                    .map(|(id, _)| *id),
            );
        }
    }
}

fn pattern_of(condition: &Condition) -> &Pattern {
    match condition.operand() {
        Operand::Regexp(pattern) => pattern,
        operand => unreachable!("regexp index got a {operand:?} operand. This is a bug."),
    }
}
