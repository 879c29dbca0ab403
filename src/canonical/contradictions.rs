use crate::{
    condition::{Condition, Keyword, Operand},
    predicates::Scalar,
};
use std::collections::HashMap;

/// Single pass over a clause, tracking per-field assertions, that stops at
/// the first pair of conditions which cannot hold together.
pub(crate) fn is_contradictory(conditions: &[Condition]) -> bool {
    let mut facts: HashMap<&str, FieldFacts> = HashMap::new();
    conditions
        .iter()
        .any(|condition| facts.entry(condition.field()).or_default().contradicts(condition))
}

#[derive(Default)]
struct FieldFacts<'a> {
    equals: Option<&'a Scalar>,
    not_equals: Vec<&'a Scalar>,
    exists: bool,
    not_exists: bool,
    interval: Option<(f64, f64)>,
    contains: Vec<&'a Scalar>,
    not_contains: Vec<&'a Scalar>,
}

impl<'a> FieldFacts<'a> {
    fn contradicts(&mut self, condition: &'a Condition) -> bool {
        match (condition.keyword(), condition.operand()) {
            (Keyword::Equals, Operand::Value(value)) => {
                if self.equals.is_some_and(|equals| equals != value)
                    || self.not_equals.contains(&value)
                    || self.not_exists
                    || !self.contains.is_empty()
                    || self.interval.is_some_and(|interval| !within(interval, value))
                {
                    return true;
                }
                self.equals = Some(value);
                false
            }
            (Keyword::NotEquals, Operand::Value(value)) => {
                if self.equals == Some(value) {
                    return true;
                }
                self.not_equals.push(value);
                false
            }
            (Keyword::Exists, Operand::Exists(None)) => {
                self.exists = true;
                self.not_exists
            }
            (Keyword::NotExists, Operand::Exists(None)) => {
                self.not_exists = true;
                self.exists
                    || self.equals.is_some()
                    || self.interval.is_some()
                    || !self.contains.is_empty()
            }
            (Keyword::Exists, Operand::Exists(Some(value))) => {
                if self.not_exists
                    || self.equals.is_some()
                    || self.interval.is_some()
                    || self.not_contains.contains(&value)
                {
                    return true;
                }
                self.contains.push(value);
                false
            }
            (Keyword::NotExists, Operand::Exists(Some(value))) => {
                if self.contains.contains(&value) {
                    return true;
                }
                self.not_contains.push(value);
                false
            }
            (Keyword::Range, Operand::Range(bounds)) => {
                let (low, high) = bounds.interval();
                let (low, high) = match self.interval {
                    Some((previous_low, previous_high)) => {
                        (previous_low.max(low), previous_high.min(high))
                    }
                    None => (low, high),
                };
                if low > high
                    || self.not_exists
                    || !self.contains.is_empty()
                    || self.equals.is_some_and(|equals| !within((low, high), equals))
                {
                    return true;
                }
                self.interval = Some((low, high));
                false
            }
            _ => false,
        }
    }
}

fn within((low, high): (f64, f64), value: &Scalar) -> bool {
    value
        .as_f64()
        .is_some_and(|value| low <= value && value <= high)
}
