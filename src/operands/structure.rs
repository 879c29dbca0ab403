use crate::{
    condition::{Condition, Operand},
    document::Document,
    hash::ConditionId,
};
use serde_json::Value;

/// `match`/`notmatch`. Partial structures cannot be hashed into buckets, so
/// every condition is checked against the document in insertion order.
#[derive(Debug, Default)]
pub(crate) struct StructureOperand {
    negated: bool,
    entries: Vec<(ConditionId, String, Value)>,
}

impl StructureOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition) {
        self.entries.push((
            condition.id(),
            condition.field().to_owned(),
            structure_of(condition).clone(),
        ));
    }

    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(position) = self
            .entries
            .iter()
            .position(|(id, _, _)| *id == condition.id())
        else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        self.entries.remove(position);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn has_field(&self, field: &str) -> bool {
        self.entries.iter().any(|(_, known, _)| known == field)
    }

    pub(crate) fn test(&self, document: &Document, fired: &mut Vec<ConditionId>) {
        fired.extend(
            self.entries
                .iter()
                .filter(|(_, field, expected)| {
                    document
                        .get(field)
                        .is_some_and(|actual| contains(expected, actual))
                        != self.negated
                })
                .map(|(id, _, _)| *id),
        );
    }
}

/// Whether `actual` holds every key and element of `expected`. Array
/// elements are matched in any order, each document element at most once.
pub(crate) fn contains(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => expected.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|actual| contains(value, actual))
        }),
        (Value::Array(expected), Value::Array(actual)) => {
            expected.len() <= actual.len() && assign_elements(expected, actual)
        }
        (Value::Number(expected), Value::Number(actual)) => expected.as_f64() == actual.as_f64(),
        (expected, actual) => expected == actual,
    }
}

/// Finds a one-to-one assignment of `expected` elements to the `actual`
/// elements containing them, by augmenting paths.
fn assign_elements(expected: &[Value], actual: &[Value]) -> bool {
    let candidates: Vec<Vec<usize>> = expected
        .iter()
        .map(|value| {
            (0..actual.len())
                .filter(|i| contains(value, &actual[*i]))
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; actual.len()];
    (0..expected.len()).all(|element| {
        let mut visited = vec![false; actual.len()];
        augment(element, &candidates, &mut owner, &mut visited)
    })
}

fn augment(
    element: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &slot in &candidates[element] {
        if visited[slot] {
            continue;
        }
        visited[slot] = true;
        let free = match owner[slot] {
            None => true,
            Some(other) => augment(other, candidates, owner, visited),
        };
        if free {
            owner[slot] = Some(element);
            return true;
        }
    }
    false
}

fn structure_of(condition: &Condition) -> &Value {
    match condition.operand() {
        Operand::Structure(value) => value,
        operand => unreachable!("match index got a {operand:?} operand. This is a bug."),
    }
}
