//! Canonical leaf predicates and clauses.

use crate::{
    config::RegexEngine,
    error::{PercolatorError, Result},
    hash::{ConditionId, ContentHasher, FilterId, SubfilterId},
    predicates::{RangeBounds, Scalar, Shape},
};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Closed set of condition kinds, with negation folded into the name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Everything,
    Nothing,
    Equals,
    NotEquals,
    Exists,
    NotExists,
    Range,
    NotRange,
    Regexp,
    NotRegexp,
    Geospatial,
    NotGeospatial,
    Match,
    NotMatch,
    Select,
    NotSelect,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Everything => "everything",
            Self::Nothing => "nothing",
            Self::Equals => "equals",
            Self::NotEquals => "notequals",
            Self::Exists => "exists",
            Self::NotExists => "notexists",
            Self::Range => "range",
            Self::NotRange => "notrange",
            Self::Regexp => "regexp",
            Self::NotRegexp => "notregexp",
            Self::Geospatial => "geospatial",
            Self::NotGeospatial => "notgeospatial",
            Self::Match => "match",
            Self::NotMatch => "notmatch",
            Self::Select => "select",
            Self::NotSelect => "notselect",
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Everything => Self::Nothing,
            Self::Nothing => Self::Everything,
            Self::Equals => Self::NotEquals,
            Self::NotEquals => Self::Equals,
            Self::Exists => Self::NotExists,
            Self::NotExists => Self::Exists,
            Self::Range => Self::NotRange,
            Self::NotRange => Self::Range,
            Self::Regexp => Self::NotRegexp,
            Self::NotRegexp => Self::Regexp,
            Self::Geospatial => Self::NotGeospatial,
            Self::NotGeospatial => Self::Geospatial,
            Self::Match => Self::NotMatch,
            Self::NotMatch => Self::Match,
            Self::Select => Self::NotSelect,
            Self::NotSelect => Self::Select,
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Self::Nothing
                | Self::NotEquals
                | Self::NotExists
                | Self::NotRange
                | Self::NotRegexp
                | Self::NotGeospatial
                | Self::NotMatch
                | Self::NotSelect
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical leaf predicate: keyword, field and operand.
#[derive(Debug, Clone, Serialize)]
pub struct Condition {
    #[serde(skip)]
    id: ConditionId,
    keyword: Keyword,
    field: String,
    operand: Operand,
    #[serde(skip)]
    canonical: Vec<u8>,
}

impl Condition {
    pub(crate) fn new(
        keyword: Keyword,
        field: String,
        operand: Operand,
        hasher: &ContentHasher,
    ) -> Self {
        let canonical = serde_json::to_vec(&(keyword, &field, &operand))
            .unwrap_or_else(|e| unreachable!("conditions always serialize, got {e}. This is a bug."));
        Self {
            id: hasher.condition(&canonical),
            keyword,
            field,
            operand,
            canonical,
        }
    }

    pub(crate) fn everything(hasher: &ContentHasher) -> Self {
        Self::new(Keyword::Everything, String::new(), Operand::Unit, hasher)
    }

    pub(crate) fn nothing(hasher: &ContentHasher) -> Self {
        Self::new(Keyword::Nothing, String::new(), Operand::Unit, hasher)
    }

    pub(crate) fn negate(&self, hasher: &ContentHasher) -> Self {
        Self::new(
            self.keyword.negate(),
            self.field.clone(),
            self.operand.clone(),
            hasher,
        )
    }

    pub(crate) fn id(&self) -> ConditionId {
        self.id
    }

    pub(crate) fn operand(&self) -> &Operand {
        &self.operand
    }

    pub(crate) fn canonical(&self) -> &[u8] {
        &self.canonical
    }

    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Operand {
    Unit,
    Value(Scalar),
    Exists(Option<Scalar>),
    Range(Bounds),
    Regexp(Pattern),
    Shape(Shape),
    Structure(Value),
    Select(Selection),
}

/// A canonical AND-clause: conditions sorted by keyword name, then content.
#[derive(Debug, Clone, Serialize)]
pub struct Clause {
    #[serde(skip)]
    id: SubfilterId,
    conditions: Vec<Condition>,
}

impl Clause {
    pub(crate) fn new(mut conditions: Vec<Condition>, hasher: &ContentHasher) -> Self {
        conditions.sort_by(|a, b| {
            a.keyword
                .as_str()
                .cmp(b.keyword.as_str())
                .then_with(|| a.canonical.cmp(&b.canonical))
        });
        conditions.dedup_by(|a, b| a.canonical == b.canonical);
        let id = hasher.subfilter(conditions.iter().map(Condition::canonical));
        Self { id, conditions }
    }

    pub(crate) fn id(&self) -> SubfilterId {
        self.id
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// `select` operand: a canonical filter run against one array element.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Selection {
    index: i64,
    clauses: Vec<Clause>,
    #[serde(skip)]
    filter: FilterId,
}

impl Selection {
    pub(crate) fn new(index: i64, clauses: Vec<Clause>, filter: FilterId) -> Self {
        Self {
            index,
            clauses,
            filter,
        }
    }

    pub(crate) fn index(&self) -> i64 {
        self.index
    }

    pub(crate) fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub(crate) fn filter(&self) -> FilterId {
        self.filter
    }
}

/// Range bounds are turned into closed intervals by moving exclusive bounds
/// this far inwards.
pub(crate) const RANGE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Bound {
    value: f64,
    inclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Bounds {
    low: Option<Bound>,
    high: Option<Bound>,
}

impl Bounds {
    pub(crate) fn from_range(field: &str, range: &RangeBounds) -> Result<Self> {
        let invalid = |reason: &str| PercolatorError::invalid_predicate(field, reason);
        let low = match (range.gt, range.gte) {
            (Some(_), Some(_)) => return Err(invalid("gt and gte are mutually exclusive")),
            (Some(value), None) => Some(Bound {
                value,
                inclusive: false,
            }),
            (None, Some(value)) => Some(Bound {
                value,
                inclusive: true,
            }),
            (None, None) => None,
        };
        let high = match (range.lt, range.lte) {
            (Some(_), Some(_)) => return Err(invalid("lt and lte are mutually exclusive")),
            (Some(value), None) => Some(Bound {
                value,
                inclusive: false,
            }),
            (None, Some(value)) => Some(Bound {
                value,
                inclusive: true,
            }),
            (None, None) => None,
        };
        if low.is_none() && high.is_none() {
            return Err(invalid("a range needs at least one bound"));
        }
        if low.iter().chain(high.iter()).any(|b| !b.value.is_finite()) {
            return Err(invalid("range bounds must be finite numbers"));
        }

        let bounds = Self { low, high };
        let (low, high) = bounds.interval();
        if low > high {
            return Err(invalid("the range is empty"));
        }
        Ok(bounds)
    }

    /// Closed interval equivalent to these bounds.
    pub(crate) fn interval(&self) -> (f64, f64) {
        let low = match self.low {
            Some(Bound {
                value,
                inclusive: true,
            }) => value,
            Some(Bound {
                value,
                inclusive: false,
            }) => above(value),
            None => f64::NEG_INFINITY,
        };
        let high = match self.high {
            Some(Bound {
                value,
                inclusive: true,
            }) => value,
            Some(Bound {
                value,
                inclusive: false,
            }) => below(value),
            None => f64::INFINITY,
        };
        (low, high)
    }

    /// Closed intervals covering every number outside of these bounds.
    pub(crate) fn complement(&self) -> Vec<(f64, f64)> {
        let mut intervals = Vec::with_capacity(2);
        if let Some(Bound { value, inclusive }) = self.low {
            let high = if inclusive { below(value) } else { value };
            intervals.push((f64::NEG_INFINITY, high));
        }
        if let Some(Bound { value, inclusive }) = self.high {
            let low = if inclusive { above(value) } else { value };
            intervals.push((low, f64::INFINITY));
        }
        intervals
    }
}

pub(crate) fn above(value: f64) -> f64 {
    let bumped = value + RANGE_EPSILON;
    if bumped > value {
        bumped
    } else {
        next_up(value)
    }
}

pub(crate) fn below(value: f64) -> f64 {
    let bumped = value - RANGE_EPSILON;
    if bumped < value {
        bumped
    } else {
        -next_up(-value)
    }
}

fn next_up(value: f64) -> f64 {
    if value.is_nan() || value == f64::INFINITY {
        value
    } else if value == 0.0 {
        f64::from_bits(1)
    } else if value > 0.0 {
        f64::from_bits(value.to_bits() + 1)
    } else {
        f64::from_bits(value.to_bits() - 1)
    }
}

/// Compiled `regexp` operand. Identity is the source and normalized flags.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Pattern {
    source: String,
    flags: String,
    #[serde(skip)]
    regex: Regex,
}

impl Pattern {
    const ALLOWED_FLAGS: &'static str = "gimsuy";

    pub(crate) fn compile(
        field: &str,
        source: &str,
        flags: &str,
        engine: RegexEngine,
    ) -> Result<Self> {
        if let Some(flag) = flags.chars().find(|c| !Self::ALLOWED_FLAGS.contains(*c)) {
            return Err(PercolatorError::invalid_predicate(
                field,
                format!("unsupported regular expression flag {flag:?}"),
            ));
        }
        let mut effective: Vec<char> = flags.chars().filter(|c| "ims".contains(*c)).collect();
        effective.sort_unstable();
        effective.dedup();

        let regex = engine
            .compile(
                source,
                effective.contains(&'i'),
                effective.contains(&'m'),
                effective.contains(&'s'),
            )
            .map_err(|e| PercolatorError::invalid_predicate(field, e.to_string()))?;
        Ok(Self {
            source: source.to_owned(),
            flags: effective.into_iter().collect(),
            regex,
        })
    }

    pub(crate) fn key(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    pub(crate) fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}
