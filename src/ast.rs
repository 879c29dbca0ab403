use crate::{
    error::{PercolatorError, Result},
    predicates::{Predicate, PredicateKind, RangeBounds, Shape},
};
use serde_json::{Map, Value};

/// A standardized boolean filter tree.
#[derive(PartialEq, Clone, Debug)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// Sugar-expanded alternatives (`in`, `ids`, ...) that canonicalization
    /// keeps together as a single variable.
    Group(Group),
    Value(Predicate),
}

#[derive(PartialEq, Clone, Debug)]
pub struct Group {
    operator: GroupOperator,
    predicates: Vec<Predicate>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum GroupOperator {
    All,
    Any,
}

impl GroupOperator {
    pub(crate) fn dual(self) -> Self {
        match self {
            Self::All => Self::Any,
            Self::Any => Self::All,
        }
    }
}

impl Group {
    pub fn new(operator: GroupOperator, predicates: Vec<Predicate>) -> Self {
        Self {
            operator,
            predicates,
        }
    }

    pub fn operator(&self) -> GroupOperator {
        self.operator
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

impl From<Predicate> for Node {
    fn from(predicate: Predicate) -> Self {
        Self::Value(predicate)
    }
}

impl Node {
    pub fn and(children: Vec<Node>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<Node>) -> Self {
        Self::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(node: Node) -> Self {
        Self::Not(Box::new(node))
    }

    /// The filter matching every document.
    pub fn everything() -> Self {
        Self::And(vec![])
    }

    /// The filter matching no document.
    pub fn nothing() -> Self {
        Self::Or(vec![])
    }

    pub fn any_of(predicates: Vec<Predicate>) -> Self {
        Self::Group(Group::new(GroupOperator::Any, predicates))
    }

    pub fn all_of(predicates: Vec<Predicate>) -> Self {
        Self::Group(Group::new(GroupOperator::All, predicates))
    }

    /// The `in` sugar: `field` equals one of `values`.
    pub fn one_of<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::any_of(
            values
                .into_iter()
                .map(|value| Predicate::equals(field, value))
                .collect(),
        )
    }

    /// Parses the standardized JSON form of a filter.
    ///
    /// ```text
    /// {"and": [..]}  {"or": [..]}  {"not": {..}}  {"or": [..], "atomic": true}
    /// {"keyword": "equals", "field": "foo", "value": "bar"}
    /// ```
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed(format!("expected an object, got {value}")))?;
        if let Some(keyword) = object.get("keyword") {
            return parse_leaf(keyword, object);
        }

        let atomic = match object.get("atomic") {
            None => false,
            Some(Value::Bool(atomic)) => *atomic,
            Some(other) => return Err(malformed(format!("atomic must be a boolean, got {other}"))),
        };
        let mut entries = object.iter().filter(|(key, _)| key.as_str() != "atomic");
        let (Some((key, operand)), None) = (entries.next(), entries.next()) else {
            return Err(malformed(
                "a node must hold exactly one of `and`, `or` or `not`",
            ));
        };

        match (key.as_str(), operand) {
            ("and", Value::Array(children)) if atomic => Ok(Self::Group(Group::new(
                GroupOperator::All,
                parse_group(children)?,
            ))),
            ("or", Value::Array(children)) if atomic => Ok(Self::Group(Group::new(
                GroupOperator::Any,
                parse_group(children)?,
            ))),
            ("and", Value::Array(children)) => Ok(Self::And(
                children.iter().map(Self::from_json).collect::<Result<_>>()?,
            )),
            ("or", Value::Array(children)) => Ok(Self::Or(
                children.iter().map(Self::from_json).collect::<Result<_>>()?,
            )),
            ("not", operand) if !atomic => Ok(Self::not(Self::from_json(operand)?)),
            (key, operand) => Err(malformed(format!("unexpected `{key}` node: {operand}"))),
        }
    }
}

fn malformed(reason: impl Into<String>) -> PercolatorError {
    PercolatorError::MalformedFilter(reason.into())
}

fn parse_group(children: &[Value]) -> Result<Vec<Predicate>> {
    children
        .iter()
        .map(|child| match Node::from_json(child)? {
            Node::Value(predicate) => Ok(predicate),
            other => Err(malformed(format!(
                "atomic groups only hold positive leaves, got {other:?}"
            ))),
        })
        .collect()
}

fn parse_leaf(keyword: &Value, object: &Map<String, Value>) -> Result<Node> {
    let keyword = keyword
        .as_str()
        .ok_or_else(|| malformed(format!("keyword must be a string, got {keyword}")))?;
    match keyword {
        "everything" => return Ok(Node::everything()),
        "nothing" => return Ok(Node::nothing()),
        _ => {}
    }

    let field = match object.get("field") {
        Some(Value::String(field)) => field.as_str(),
        Some(other) => return Err(malformed(format!("field must be a string, got {other}"))),
        None => return Err(malformed(format!("`{keyword}` requires a field"))),
    };
    let (negated, name) = match keyword.strip_prefix("not") {
        Some(name) => (true, name),
        None => (false, keyword),
    };
    let value = object.get("value");
    let required = || {
        value.ok_or_else(|| PercolatorError::invalid_predicate(field, format!("`{keyword}` requires a value")))
    };
    let invalid = |e: serde_json::Error| PercolatorError::invalid_predicate(field, e.to_string());

    let kind = match name {
        "equals" => PredicateKind::Equals(required()?.clone()),
        "exists" => PredicateKind::Exists(value.cloned()),
        "range" => PredicateKind::Range(
            serde_json::from_value::<RangeBounds>(required()?.clone()).map_err(invalid)?,
        ),
        "regexp" => {
            let value = required()?;
            let pattern = value.get("pattern").and_then(Value::as_str).ok_or_else(|| {
                PercolatorError::invalid_predicate(field, "regexp requires a string pattern")
            })?;
            let flags = match value.get("flags") {
                None => "",
                Some(Value::String(flags)) => flags.as_str(),
                Some(other) => {
                    return Err(PercolatorError::invalid_predicate(
                        field,
                        format!("flags must be a string, got {other}"),
                    ))
                }
            };
            PredicateKind::Regexp {
                pattern: pattern.to_owned(),
                flags: flags.to_owned(),
            }
        }
        "geospatial" => PredicateKind::Geospatial(
            serde_json::from_value::<Shape>(required()?.clone()).map_err(invalid)?,
        ),
        "match" => PredicateKind::Match(required()?.clone()),
        "select" => {
            let value = required()?;
            let index = value.get("index").and_then(Value::as_i64).ok_or_else(|| {
                PercolatorError::invalid_predicate(field, "select requires an integer index")
            })?;
            let filter = value.get("filter").ok_or_else(|| {
                PercolatorError::invalid_predicate(field, "select requires a filter")
            })?;
            PredicateKind::Select {
                index,
                filter: Box::new(Node::from_json(filter)?),
            }
        }
        _ => return Err(malformed(format!("unknown keyword `{keyword}`"))),
    };

    let node = Node::Value(Predicate::new(field, kind));
    Ok(if negated { Node::not(node) } else { node })
}
