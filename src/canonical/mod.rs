//! Reduction of filter trees to a minimized disjunctive normal form.
//!
//! Every distinct leaf (or atomic group) of the tree becomes a boolean
//! variable. With few variables the tree is evaluated over the whole truth
//! table and the true rows are minimized into product terms; past that the
//! terms are built by distributing the tree directly. Every term is then
//! expanded back into concrete clauses. Clauses that cannot hold are
//! dropped, and what remains is sorted so that equivalent filters serialize,
//! and therefore hash, identically.
mod contradictions;
mod distribute;
mod minimizer;

use self::{
    distribute::Term,
    minimizer::{minimize, Cube},
};
use crate::{
    ast::{Group, GroupOperator, Node},
    condition::{Bounds, Clause, Condition, Keyword, Operand, Pattern, Selection},
    config::{Config, RegexEngine},
    error::{PercolatorError, Result},
    hash::{ContentHasher, FilterId},
    predicates::{Predicate, PredicateKind, Scalar},
};
use itertools::Itertools;

/// Filters with more distinct variables skip the truth table.
const EXHAUSTIVE_VARIABLES: usize = 8;

#[derive(Debug)]
pub(crate) struct Canonicalizer {
    max_conditions: usize,
    regex_engine: RegexEngine,
    hasher: ContentHasher,
}

#[derive(PartialEq)]
enum Variable<'a> {
    Predicate(&'a Predicate),
    Group(&'a Group),
}

impl Variable<'_> {
    fn leaves(&self) -> usize {
        match self {
            Self::Predicate(_) => 1,
            Self::Group(group) => group.predicates().len(),
        }
    }
}

enum Resolved {
    Single(Condition),
    Group(GroupOperator, Vec<Condition>),
}

#[derive(Debug, Clone)]
enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Literal(usize, bool),
}

impl Expr {
    fn evaluate(&self, row: u64) -> bool {
        match self {
            Self::And(children) => children.iter().all(|child| child.evaluate(row)),
            Self::Or(children) => children.iter().any(|child| child.evaluate(row)),
            Self::Literal(variable, positive) => ((row >> variable) & 1 == 1) == *positive,
        }
    }
}

impl Canonicalizer {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            max_conditions: config.max_conditions,
            regex_engine: config.regex_engine,
            hasher: ContentHasher::new(config.seed),
        }
    }

    pub(crate) fn filter_id(&self, namespace: &str, clauses: &[Clause]) -> FilterId {
        self.hasher.filter(namespace, clauses.iter().map(Clause::id))
    }

    /// Converts `filter` to its canonical list of clauses. Fails before doing
    /// any work when the filter is too complex or holds an invalid leaf.
    pub(crate) fn convert(&self, filter: &Node) -> Result<Vec<Clause>> {
        let mut variables = Vec::new();
        let expr = extract(filter, true, &mut variables);

        let leaves = variables.iter().map(Variable::leaves).sum::<usize>();
        if self.max_conditions > 0 && leaves > self.max_conditions {
            tracing::debug!(leaves, max = self.max_conditions, "rejecting filter");
            return Err(PercolatorError::FilterTooComplex {
                count: leaves,
                max: self.max_conditions,
            });
        }
        let resolved = variables
            .iter()
            .map(|variable| self.resolve(variable))
            .collect::<Result<Vec<_>>>()?;

        let terms = if variables.len() <= EXHAUSTIVE_VARIABLES {
            truth_table(&expr, variables.len())
        } else {
            distribute::terms(&expr)
        };

        let clauses = terms
            .iter()
            .flat_map(|term| self.expand(term, &resolved))
            .collect();
        Ok(self.finish(clauses))
    }

    fn resolve(&self, variable: &Variable) -> Result<Resolved> {
        match variable {
            Variable::Predicate(predicate) => self.condition(predicate).map(Resolved::Single),
            Variable::Group(group) => Ok(Resolved::Group(
                group.operator(),
                group
                    .predicates()
                    .iter()
                    .map(|predicate| self.condition(predicate))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    fn condition(&self, predicate: &Predicate) -> Result<Condition> {
        let field = predicate.field();
        if field.is_empty() {
            return Err(PercolatorError::invalid_predicate(field, "empty field name"));
        }
        let (keyword, operand) = match predicate.kind() {
            PredicateKind::Equals(value) => (Keyword::Equals, Operand::Value(scalar(field, value)?)),
            PredicateKind::Exists(value) => (
                Keyword::Exists,
                Operand::Exists(value.as_ref().map(|value| scalar(field, value)).transpose()?),
            ),
            PredicateKind::Range(range) => {
                (Keyword::Range, Operand::Range(Bounds::from_range(field, range)?))
            }
            PredicateKind::Regexp { pattern, flags } => (
                Keyword::Regexp,
                Operand::Regexp(Pattern::compile(field, pattern, flags, self.regex_engine)?),
            ),
            PredicateKind::Geospatial(shape) => {
                shape
                    .validate()
                    .map_err(|reason| PercolatorError::invalid_predicate(field, reason))?;
                (Keyword::Geospatial, Operand::Shape(shape.clone()))
            }
            PredicateKind::Match(value) => (Keyword::Match, Operand::Structure(value.clone())),
            PredicateKind::Select { index, filter } => {
                let clauses = self.convert(filter)?;
                let id = self.filter_id("", &clauses);
                (
                    Keyword::Select,
                    Operand::Select(Selection::new(*index, clauses, id)),
                )
            }
        };
        Ok(Condition::new(keyword, field.to_owned(), operand, &self.hasher))
    }

    /// One product term can stand for several clauses when it asserts
    /// alternative groups: those are expanded as a cartesian product.
    fn expand(&self, term: &Term, resolved: &[Resolved]) -> Vec<Vec<Condition>> {
        let mut fixed = Vec::new();
        let mut alternatives: Vec<Vec<Condition>> = Vec::new();
        for &(variable, asserted) in term {
            match &resolved[variable] {
                Resolved::Single(condition) if asserted => fixed.push(condition.clone()),
                Resolved::Single(condition) => fixed.push(condition.negate(&self.hasher)),
                Resolved::Group(operator, members) => {
                    let (operator, members) = if asserted {
                        (*operator, members.clone())
                    } else {
                        (
                            operator.dual(),
                            members
                                .iter()
                                .map(|member| member.negate(&self.hasher))
                                .collect(),
                        )
                    };
                    match operator {
                        GroupOperator::All => fixed.extend(members),
                        GroupOperator::Any => alternatives.push(members),
                    }
                }
            }
        }

        if alternatives.is_empty() {
            return vec![fixed];
        }
        alternatives
            .into_iter()
            .multi_cartesian_product()
            .map(|choice| fixed.iter().cloned().chain(choice).collect())
            .collect()
    }

    fn finish(&self, clauses: Vec<Vec<Condition>>) -> Vec<Clause> {
        if clauses.iter().any(Vec::is_empty) {
            return vec![Clause::new(
                vec![Condition::everything(&self.hasher)],
                &self.hasher,
            )];
        }

        let mut clauses: Vec<Clause> = clauses
            .into_iter()
            .filter(|conditions| !contradictions::is_contradictory(conditions))
            .map(|conditions| Clause::new(conditions, &self.hasher))
            .collect();
        clauses.sort_by_key(Clause::id);
        clauses.dedup_by_key(|clause| clause.id());

        if clauses.is_empty() {
            vec![Clause::new(
                vec![Condition::nothing(&self.hasher)],
                &self.hasher,
            )]
        } else {
            clauses
        }
    }
}

fn truth_table(expr: &Expr, variables: usize) -> Vec<Term> {
    let cubes = match variables {
        0 => {
            if expr.evaluate(0) {
                vec![Cube::tautology(0)]
            } else {
                vec![]
            }
        }
        1 => match (expr.evaluate(0), expr.evaluate(1)) {
            (false, false) => vec![],
            (true, true) => vec![Cube::tautology(1)],
            (false, true) => vec![Cube::minterm(1)],
            (true, false) => vec![Cube::minterm(0)],
        },
        n => {
            let minterms: Vec<u64> = (0..1u64 << n).filter(|row| expr.evaluate(*row)).collect();
            minimize(n, &minterms)
        }
    };
    cubes.iter().map(|cube| cube.term(variables)).collect()
}

fn scalar(field: &str, value: &serde_json::Value) -> Result<Scalar> {
    Scalar::from_value(value).ok_or_else(|| {
        PercolatorError::invalid_predicate(field, format!("expected a scalar value, got {value}"))
    })
}

/// Depth-first leaf extraction with negations pushed down to the leaves.
fn extract<'a>(node: &'a Node, positive: bool, variables: &mut Vec<Variable<'a>>) -> Expr {
    match node {
        Node::And(children) | Node::Or(children) => {
            let children = children
                .iter()
                .map(|child| extract(child, positive, variables))
                .collect();
            if matches!(node, Node::And(_)) == positive {
                Expr::And(children)
            } else {
                Expr::Or(children)
            }
        }
        Node::Not(child) => extract(child, !positive, variables),
        Node::Group(group) => Expr::Literal(index_of(variables, Variable::Group(group)), positive),
        Node::Value(predicate) => {
            Expr::Literal(index_of(variables, Variable::Predicate(predicate)), positive)
        }
    }
}

fn index_of<'a>(variables: &mut Vec<Variable<'a>>, variable: Variable<'a>) -> usize {
    variables
        .iter()
        .position(|known| *known == variable)
        .unwrap_or_else(|| {
            variables.push(variable);
            variables.len() - 1
        })
}
