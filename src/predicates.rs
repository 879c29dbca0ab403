use crate::ast::Node;
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A leaf test on a single field of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    field: String,
    kind: PredicateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateKind {
    /// The field holds exactly this scalar.
    Equals(Value),
    /// The field is present. With a value, the field is an array containing it.
    Exists(Option<Value>),
    Range(RangeBounds),
    Regexp { pattern: String, flags: String },
    Geospatial(Shape),
    /// Deep partial match of the field against a JSON structure.
    Match(Value),
    /// Runs `filter` against `{value: <element>}` where `element` is the
    /// array element at `index` (negative indexes count from the end).
    Select { index: i64, filter: Box<Node> },
}

impl Predicate {
    pub fn new(field: impl Into<String>, kind: PredicateKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, PredicateKind::Equals(value.into()))
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, PredicateKind::Exists(None))
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, PredicateKind::Exists(Some(value.into())))
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Self {
        Self::new(field, PredicateKind::Range(bounds))
    }

    pub fn regexp(
        field: impl Into<String>,
        pattern: impl Into<String>,
        flags: impl Into<String>,
    ) -> Self {
        Self::new(
            field,
            PredicateKind::Regexp {
                pattern: pattern.into(),
                flags: flags.into(),
            },
        )
    }

    pub fn geospatial(field: impl Into<String>, shape: Shape) -> Self {
        Self::new(field, PredicateKind::Geospatial(shape))
    }

    pub fn matches(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, PredicateKind::Match(value.into()))
    }

    pub fn select(field: impl Into<String>, index: i64, filter: Node) -> Self {
        Self::new(
            field,
            PredicateKind::Select {
                index,
                filter: Box::new(filter),
            },
        )
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }
}

/// Bounds of a `range` predicate. `gt`/`lt` are exclusive, `gte`/`lte` inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl RangeBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, value: f64) -> Self {
        self.gt = Some(value);
        self
    }

    pub fn gte(mut self, value: f64) -> Self {
        self.gte = Some(value);
        self
    }

    pub fn lt(mut self, value: f64) -> Self {
        self.lt = Some(value);
        self
    }

    pub fn lte(mut self, value: f64) -> Self {
        self.lte = Some(value);
        self
    }
}

/// Geographic shapes. Coordinates are in degrees, distances in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub enum Shape {
    BoundingBox {
        top: f64,
        left: f64,
        bottom: f64,
        right: f64,
    },
    Circle {
        lat: f64,
        lon: f64,
        radius: f64,
    },
    Annulus {
        lat: f64,
        lon: f64,
        from: f64,
        to: f64,
    },
    /// Vertices as `[lat, lon]` pairs.
    Polygon { points: Vec<[f64; 2]> },
}

impl Shape {
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Self::BoundingBox {
                top,
                left,
                bottom,
                right,
            } => {
                validate_latitude(*top)?;
                validate_latitude(*bottom)?;
                validate_longitude(*left)?;
                validate_longitude(*right)?;
                if bottom > top {
                    return Err(format!("bottom ({bottom}) is above top ({top})"));
                }
                if left > right {
                    return Err(format!("left ({left}) is east of right ({right})"));
                }
                Ok(())
            }
            Self::Circle { lat, lon, radius } => {
                validate_latitude(*lat)?;
                validate_longitude(*lon)?;
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(format!("radius must be a positive distance, got {radius}"));
                }
                Ok(())
            }
            Self::Annulus { lat, lon, from, to } => {
                validate_latitude(*lat)?;
                validate_longitude(*lon)?;
                if !from.is_finite() || !to.is_finite() || *from < 0.0 || from >= to {
                    return Err(format!("invalid distance range [{from}, {to}]"));
                }
                Ok(())
            }
            Self::Polygon { points } => {
                if points.len() < 3 {
                    return Err(format!(
                        "a polygon needs at least 3 points, got {}",
                        points.len()
                    ));
                }
                points.iter().try_for_each(|[lat, lon]| {
                    validate_latitude(*lat)?;
                    validate_longitude(*lon)
                })
            }
        }
    }
}

fn validate_latitude(lat: f64) -> Result<(), String> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(format!("latitude {lat} is out of bounds"))
    }
}

fn validate_longitude(lon: f64) -> Result<(), String> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(format!("longitude {lon} is out of bounds"))
    }
}

/// Hashable form of a JSON scalar. Numbers are normalized decimals so that
/// `1` and `1.0` compare and hash the same way. Numbers a decimal cannot hold
/// exactly keep their `f64` bits.
#[derive(Hash, Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum Scalar {
    Null,
    Boolean(bool),
    Number(Decimal),
    Float(u64),
    String(String),
}

impl Scalar {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(value) => Some(Self::Boolean(*value)),
            Value::Number(number) => Some(Self::from_number(number)),
            Value::String(value) => Some(Self::String(value.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn from_number(number: &Number) -> Self {
        if let Some(value) = number.as_i64() {
            return Self::Number(Decimal::from(value).normalize());
        }
        if let Some(value) = number.as_u64() {
            return Self::Number(Decimal::from(value).normalize());
        }

        let value = number.as_f64().unwrap_or(f64::NAN);
        if value == 0.0 {
            return Self::Number(Decimal::ZERO);
        }
        match Decimal::from_f64(value) {
            Some(decimal) if decimal.to_f64() == Some(value) => Self::Number(decimal.normalize()),
            _ => Self::Float(value.to_bits()),
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.to_f64(),
            Self::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}
