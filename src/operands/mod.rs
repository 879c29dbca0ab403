//! Per-keyword indexes of the stored conditions.
//!
//! Each keyword with at least one stored condition owns one [`FieldOperand`].
//! Testing a document asks every operand for the conditions it satisfies.
mod equals;
mod exists;
mod geospatial;
mod interval_tree;
mod range;
mod regexp;
mod select;
mod structure;

use self::{
    equals::EqualsOperand, exists::ExistsOperand, geospatial::GeospatialOperand,
    geospatial::SpatialIndex, range::RangeOperand, regexp::RegexpOperand,
    select::SelectOperand, structure::StructureOperand,
};
use crate::{condition::Condition, condition::Keyword, document::Document, hash::ConditionId};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug)]
pub(crate) enum FieldOperand {
    /// `everything` and `nothing` conditions, which ignore the document.
    Constant {
        value: bool,
        conditions: HashSet<ConditionId>,
    },
    Equals(EqualsOperand),
    Exists(ExistsOperand),
    Range(RangeOperand),
    Regexp(RegexpOperand),
    Geospatial(GeospatialOperand),
    Structure(StructureOperand),
    Select(SelectOperand),
}

impl FieldOperand {
    fn new(keyword: Keyword) -> Self {
        let negated = keyword.is_negated();
        match keyword {
            Keyword::Everything | Keyword::Nothing => Self::Constant {
                value: !negated,
                conditions: HashSet::new(),
            },
            Keyword::Equals | Keyword::NotEquals => Self::Equals(EqualsOperand::new(negated)),
            Keyword::Exists | Keyword::NotExists => Self::Exists(ExistsOperand::new(negated)),
            Keyword::Range | Keyword::NotRange => Self::Range(RangeOperand::new(negated)),
            Keyword::Regexp | Keyword::NotRegexp => Self::Regexp(RegexpOperand::new(negated)),
            Keyword::Geospatial | Keyword::NotGeospatial => {
                Self::Geospatial(GeospatialOperand::new(negated))
            }
            Keyword::Match | Keyword::NotMatch => {
                Self::Structure(StructureOperand::new(negated))
            }
            Keyword::Select | Keyword::NotSelect => Self::Select(SelectOperand::new(negated)),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Constant { conditions, .. } => conditions.is_empty(),
            Self::Equals(operand) => operand.is_empty(),
            Self::Exists(operand) => operand.is_empty(),
            Self::Range(operand) => operand.is_empty(),
            Self::Regexp(operand) => operand.is_empty(),
            Self::Geospatial(operand) => operand.is_empty(),
            Self::Structure(operand) => operand.is_empty(),
            Self::Select(operand) => operand.is_empty(),
        }
    }

    fn has_field(&self, field: &str) -> bool {
        match self {
            Self::Constant { conditions, .. } => field.is_empty() && !conditions.is_empty(),
            Self::Equals(operand) => operand.has_field(field),
            Self::Exists(operand) => operand.has_field(field),
            Self::Range(operand) => operand.has_field(field),
            Self::Regexp(operand) => operand.has_field(field),
            Self::Geospatial(operand) => operand.has_field(field),
            Self::Structure(operand) => operand.has_field(field),
            Self::Select(operand) => operand.has_field(field),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Operands {
    by_keyword: BTreeMap<Keyword, FieldOperand>,
    spatial: SpatialIndex,
}

impl Operands {
    pub(crate) fn insert(&mut self, condition: &Condition) {
        let operand = self
            .by_keyword
            .entry(condition.keyword())
            .or_insert_with(|| FieldOperand::new(condition.keyword()));
        match operand {
            FieldOperand::Constant { conditions, .. } => {
                conditions.insert(condition.id());
            }
            FieldOperand::Equals(operand) => operand.insert(condition),
            FieldOperand::Exists(operand) => operand.insert(condition),
            FieldOperand::Range(operand) => operand.insert(condition),
            FieldOperand::Regexp(operand) => operand.insert(condition),
            FieldOperand::Geospatial(operand) => operand.insert(condition, &mut self.spatial),
            FieldOperand::Structure(operand) => operand.insert(condition),
            FieldOperand::Select(operand) => operand.insert(condition),
        }
    }

    /// Drops the keyword's operand altogether once its last condition is gone.
    pub(crate) fn remove(&mut self, condition: &Condition) {
        let Some(operand) = self.by_keyword.get_mut(&condition.keyword()) else {
            unreachable!(
                "no {} operand holds the condition to remove. This is a bug.",
                condition.keyword()
            );
        };
        match operand {
            FieldOperand::Constant { conditions, .. } => {
                conditions.remove(&condition.id());
            }
            FieldOperand::Equals(operand) => operand.remove(condition),
            FieldOperand::Exists(operand) => operand.remove(condition),
            FieldOperand::Range(operand) => operand.remove(condition),
            FieldOperand::Regexp(operand) => operand.remove(condition),
            FieldOperand::Geospatial(operand) => operand.remove(condition, &mut self.spatial),
            FieldOperand::Structure(operand) => operand.remove(condition),
            FieldOperand::Select(operand) => operand.remove(condition),
        }
        if operand.is_empty() {
            self.by_keyword.remove(&condition.keyword());
        }
    }

    /// Ids of every condition `document` satisfies. A condition can be
    /// reported more than once.
    pub(crate) fn test(&self, document: &Document) -> Vec<ConditionId> {
        let mut fired = Vec::new();
        for operand in self.by_keyword.values() {
            match operand {
                FieldOperand::Constant { value, conditions } => {
                    if *value {
                        fired.extend(conditions);
                    }
                }
                FieldOperand::Equals(operand) => operand.test(document, &mut fired),
                FieldOperand::Exists(operand) => operand.test(document, &mut fired),
                FieldOperand::Range(operand) => operand.test(document, &mut fired),
                FieldOperand::Regexp(operand) => operand.test(document, &mut fired),
                FieldOperand::Geospatial(operand) => {
                    operand.test(document, &self.spatial, &mut fired)
                }
                FieldOperand::Structure(operand) => operand.test(document, &mut fired),
                FieldOperand::Select(operand) => operand.test(document, &mut fired),
            }
        }
        fired
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.by_keyword.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn keywords(&self) -> impl Iterator<Item = Keyword> + '_ {
        self.by_keyword.keys().copied()
    }

    pub(crate) fn is_indexed(&self, keyword: Keyword, field: &str) -> bool {
        self.by_keyword
            .get(&keyword)
            .is_some_and(|operand| operand.has_field(field))
    }

    #[cfg(test)]
    pub(crate) fn has_shapes(&self) -> bool {
        !self.spatial.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Node,
        canonical::Canonicalizer,
        config::Config,
        predicates::{Predicate, RangeBounds, Shape},
    };
    use serde_json::json;

    /// The single condition `filter` canonicalizes to.
    fn condition(filter: Node) -> Condition {
        let clauses = Canonicalizer::new(&Config::default())
            .convert(&filter)
            .unwrap();
        assert_eq!(1, clauses.len());
        assert_eq!(1, clauses[0].conditions().len());
        clauses[0].conditions()[0].clone()
    }

    fn fired(operands: &Operands, document: serde_json::Value) -> Vec<ConditionId> {
        let mut fired = operands.test(&Document::flatten(&document));
        fired.sort_unstable();
        fired.dedup();
        fired
    }

    fn ids(conditions: &[&Condition]) -> Vec<ConditionId> {
        let mut ids: Vec<ConditionId> = conditions.iter().map(|condition| condition.id()).collect();
        ids.sort_unstable();
        ids
    }

    fn index(conditions: &[&Condition]) -> Operands {
        let mut operands = Operands::default();
        for condition in conditions {
            operands.insert(condition);
        }
        operands
    }

    #[test]
    fn can_test_equalities() {
        let foo = condition(Predicate::equals("foo", "bar").into());
        let number = condition(Predicate::equals("num", 1).into());
        let operands = index(&[&foo, &number]);

        assert_eq!(vec![foo.id()], fired(&operands, json!({"foo": "bar"})));
        assert_eq!(vec![number.id()], fired(&operands, json!({"num": 1.0})));
        assert!(fired(&operands, json!({"foo": ["bar"]})).is_empty());
    }

    #[test]
    fn not_equals_fires_on_different_or_missing_values() {
        let foo = condition(Node::not(Predicate::equals("foo", "bar").into()));
        let operands = index(&[&foo]);

        assert_eq!(vec![foo.id()], fired(&operands, json!({"foo": "baz"})));
        assert_eq!(vec![foo.id()], fired(&operands, json!({})));
        assert!(fired(&operands, json!({"foo": "bar"})).is_empty());
    }

    #[test]
    fn can_test_existence_and_array_contents() {
        let exists = condition(Predicate::exists("foo").into());
        let contains = condition(Predicate::array_contains("foo", "bar").into());
        let missing = condition(Node::not(Predicate::array_contains("foo", "qux").into()));
        let operands = index(&[&exists, &contains, &missing]);

        assert_eq!(
            ids(&[&exists, &contains, &missing]),
            fired(&operands, json!({"foo": ["bar", "baz"]}))
        );
        assert_eq!(
            ids(&[&exists, &missing]),
            fired(&operands, json!({"foo": null}))
        );
        assert_eq!(vec![missing.id()], fired(&operands, json!({})));
    }

    #[test]
    fn range_bounds_are_exclusive_when_asked() {
        let range = condition(Predicate::range("foo", RangeBounds::new().gt(42.0).lt(110.0)).into());
        let operands = index(&[&range]);

        assert_eq!(vec![range.id()], fired(&operands, json!({"foo": 73})));
        assert!(fired(&operands, json!({"foo": 42})).is_empty());
        assert!(fired(&operands, json!({"foo": 110})).is_empty());
    }

    #[test]
    fn not_range_fires_outside_of_the_range_and_on_non_numbers() {
        let range = condition(Node::not(
            Predicate::range("foo", RangeBounds::new().gt(42.0).lt(110.0)).into(),
        ));
        let operands = index(&[&range]);

        assert_eq!(vec![range.id()], fired(&operands, json!({"foo": 42})));
        assert_eq!(vec![range.id()], fired(&operands, json!({"foo": 110})));
        assert_eq!(vec![range.id()], fired(&operands, json!({"foo": "bar"})));
        assert_eq!(vec![range.id()], fired(&operands, json!({})));
        assert!(fired(&operands, json!({"foo": 73})).is_empty());
    }

    #[test]
    fn can_test_regular_expressions() {
        let regexp = condition(Predicate::regexp("foo", "^ba.$", "i").into());
        let negated = condition(Node::not(Predicate::regexp("foo", "^qux", "").into()));
        let operands = index(&[&regexp, &negated]);

        assert_eq!(
            ids(&[&regexp, &negated]),
            fired(&operands, json!({"foo": "BAR"}))
        );
        assert_eq!(vec![negated.id()], fired(&operands, json!({"foo": 42})));
        assert!(fired(&operands, json!({"foo": "quxx"})).is_empty());
    }

    #[test]
    fn can_test_geospatial_shapes() {
        let shape = Shape::Circle {
            lat: 43.6,
            lon: 3.9,
            radius: 1_000.0,
        };
        let inside = condition(Predicate::geospatial("location", shape.clone()).into());
        let outside = condition(Node::not(Predicate::geospatial("location", shape).into()));
        let operands = index(&[&inside, &outside]);

        assert_eq!(
            vec![inside.id()],
            fired(&operands, json!({"location": {"lat": 43.6, "lon": 3.9}}))
        );
        assert_eq!(vec![outside.id()], fired(&operands, json!({"location": "44.0,3.9"})));
        assert_eq!(vec![outside.id()], fired(&operands, json!({})));
    }

    #[test]
    fn can_test_partial_structures() {
        let structure = condition(Predicate::matches("foo", json!({"bar": [1]})).into());
        let operands = index(&[&structure]);

        assert_eq!(
            vec![structure.id()],
            fired(&operands, json!({"foo": {"bar": [2, 1], "baz": true}}))
        );
        assert!(fired(&operands, json!({"foo": {"bar": [2]}})).is_empty());
    }

    #[test]
    fn can_test_array_elements() {
        let select = condition(
            Predicate::select("foo", -1, Predicate::equals("value.name", "bar").into()).into(),
        );
        let negated = condition(Node::not(
            Predicate::select("foo", 0, Predicate::equals("value", 1).into()).into(),
        ));
        let operands = index(&[&select, &negated]);

        assert_eq!(
            ids(&[&select, &negated]),
            fired(&operands, json!({"foo": [{"name": "qux"}, {"name": "bar"}]}))
        );
        assert!(fired(&operands, json!({"foo": [1, {"name": "qux"}]})).is_empty());
        assert_eq!(vec![negated.id()], fired(&operands, json!({})));
    }

    #[test]
    fn everything_always_fires_and_nothing_never_does() {
        let everything = condition(Node::everything());
        let nothing = condition(Node::nothing());
        let operands = index(&[&everything, &nothing]);

        assert_eq!(vec![everything.id()], fired(&operands, json!({})));
    }

    #[test]
    fn removing_the_last_condition_of_a_keyword_drops_its_operand() {
        let a = condition(Predicate::equals("foo", "a").into());
        let b = condition(Predicate::equals("foo", "b").into());
        let shape = condition(
            Predicate::geospatial(
                "location",
                Shape::Circle {
                    lat: 0.0,
                    lon: 0.0,
                    radius: 10.0,
                },
            )
            .into(),
        );
        let mut operands = index(&[&a, &b, &shape]);

        operands.remove(&a);
        assert!(operands.is_indexed(Keyword::Equals, "foo"));

        operands.remove(&b);
        assert!(!operands.is_indexed(Keyword::Equals, "foo"));
        assert_eq!(vec![Keyword::Geospatial], operands.keywords().collect::<Vec<_>>());

        operands.remove(&shape);
        assert!(operands.is_empty());
        assert!(!operands.has_shapes());
    }

    #[test]
    fn removing_every_kind_of_condition_empties_the_indexes() {
        let circle = Shape::Circle {
            lat: 0.0,
            lon: 0.0,
            radius: 10.0,
        };
        let filters: Vec<(Keyword, &str, Node)> = vec![
            (Keyword::Equals, "a", Predicate::equals("a", 1).into()),
            (Keyword::NotEquals, "a", Node::not(Predicate::equals("a", 2).into())),
            (Keyword::Exists, "b", Predicate::exists("b").into()),
            (Keyword::Exists, "b", Predicate::array_contains("b", "x").into()),
            (Keyword::NotExists, "c", Node::not(Predicate::exists("c").into())),
            (
                Keyword::Range,
                "d",
                Predicate::range("d", RangeBounds::new().gt(42.0).lt(110.0)).into(),
            ),
            (
                Keyword::NotRange,
                "d",
                Node::not(Predicate::range("d", RangeBounds::new().gt(42.0).lt(110.0)).into()),
            ),
            (Keyword::Regexp, "e", Predicate::regexp("e", "^foo", "i").into()),
            (Keyword::NotRegexp, "e", Node::not(Predicate::regexp("e", "bar$", "").into())),
            (Keyword::Geospatial, "f", Predicate::geospatial("f", circle.clone()).into()),
            (Keyword::NotGeospatial, "f", Node::not(Predicate::geospatial("f", circle).into())),
            (Keyword::Match, "g", Predicate::matches("g", json!({"h": [1]})).into()),
            (Keyword::NotMatch, "g", Node::not(Predicate::matches("g", json!({"h": 2})).into())),
            (
                Keyword::Select,
                "i",
                Predicate::select("i", 0, Predicate::equals("value", 1).into()).into(),
            ),
            (
                Keyword::NotSelect,
                "i",
                Node::not(Predicate::select("i", -1, Predicate::exists("value").into()).into()),
            ),
        ];
        let conditions: Vec<(Keyword, &str, Condition)> = filters
            .into_iter()
            .map(|(keyword, field, filter)| (keyword, field, condition(filter)))
            .collect();
        let mut operands = index(&conditions.iter().map(|(_, _, c)| c).collect::<Vec<_>>());

        for (keyword, field, condition) in &conditions {
            assert_eq!(*keyword, condition.keyword());
            assert!(operands.is_indexed(*keyword, field), "{keyword:?} on {field}");
        }
        for (_, _, condition) in &conditions {
            operands.remove(condition);
        }

        for (keyword, field, _) in &conditions {
            assert!(!operands.is_indexed(*keyword, field), "{keyword:?} on {field}");
        }
        assert!(operands.keywords().next().is_none());
        assert!(!operands.has_shapes());
        assert!(operands.is_empty());
        assert!(fired(&operands, json!({"a": 1, "d": 73, "e": "foo"})).is_empty());
    }

    #[test]
    fn removing_a_complemented_range_keeps_its_neighbors() {
        let inside = condition(Predicate::range("d", RangeBounds::new().gt(42.0).lt(110.0)).into());
        let outside = condition(Node::not(
            Predicate::range("d", RangeBounds::new().gt(42.0).lt(110.0)).into(),
        ));
        let low = condition(Node::not(Predicate::range("d", RangeBounds::new().gte(0.0)).into()));
        let mut operands = index(&[&inside, &outside, &low]);

        operands.remove(&outside);

        assert_eq!(vec![inside.id()], fired(&operands, json!({"d": 73})));
        assert!(fired(&operands, json!({"d": 110})).is_empty());
        assert_eq!(vec![low.id()], fired(&operands, json!({"d": -1})));
        assert_eq!(vec![low.id()], fired(&operands, json!({"d": "x"})));

        operands.remove(&low);
        assert!(!operands.is_indexed(Keyword::NotRange, "d"));
        assert!(operands.is_indexed(Keyword::Range, "d"));
    }
}
