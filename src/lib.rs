//! A real-time predicate-matching engine.
//!
//! Filters (boolean combinations of field predicates) are registered once;
//! documents are then tested against every registered filter at a cost
//! proportional to the number of *distinct* predicates. Each filter is reduced
//! to a minimized disjunctive normal form, its clauses and leaf predicates are
//! deduplicated across filters, and every leaf lands in an index specialized
//! for its kind (hash maps, interval trees, a spatial index, compiled
//! patterns).
//!
//! ```
//! use percolator::{Document, Node, Percolator, Predicate, RangeBounds};
//! use serde_json::json;
//!
//! let mut percolator = Percolator::default();
//! let filter = Node::or(vec![
//!     Predicate::equals("foo", "bar").into(),
//!     Node::not(Predicate::exists("bar").into()),
//!     Predicate::range("baz", RangeBounds::new().lt(42.0)).into(),
//! ]);
//! let id = percolator.register("index", &filter).unwrap();
//!
//! let document = Document::flatten(&json!({"foo": "foo", "bar": "baz", "baz": 13}));
//! assert_eq!(vec![id], percolator.test("index", &document).filters());
//!
//! let document = Document::flatten(&json!({"foo": "foo", "bar": "baz", "baz": 42}));
//! assert!(percolator.test("index", &document).is_empty());
//! ```
mod ast;
mod canonical;
mod condition;
mod config;
mod document;
mod engine;
mod error;
mod hash;
mod matcher;
mod operands;
mod percolator;
mod predicates;
mod storage;

pub use crate::{
    ast::{Group, GroupOperator, Node},
    condition::{Clause, Condition, Keyword},
    config::{Config, RegexEngine},
    document::Document,
    engine::{Engine, NormalizedFilter},
    error::{PercolatorError, Result},
    hash::FilterId,
    percolator::{Percolator, Report},
    predicates::{Predicate, PredicateKind, RangeBounds, Shape},
};
