use crate::predicates::Scalar;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A document to test, addressed by dotted field paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: HashMap<String, Value>,
}

/// A geographic point, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GeoPoint {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a JSON object: every nested object is reachable both under its
    /// own path and through the dotted paths of its members. Arrays are kept
    /// as values.
    pub fn flatten(value: &Value) -> Self {
        let mut document = Self::new();
        if let Value::Object(object) = value {
            document.flatten_into("", object);
        }
        document
    }

    fn flatten_into(&mut self, prefix: &str, object: &Map<String, Value>) {
        for (key, value) in object {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if let Value::Object(nested) = value {
                self.flatten_into(&path, nested);
            }
            self.fields.insert(path, value.clone());
        }
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn scalar(&self, path: &str) -> Option<Scalar> {
        self.get(path).and_then(Scalar::from_value)
    }

    pub(crate) fn number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    pub(crate) fn string(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub(crate) fn array(&self, path: &str) -> Option<&[Value]> {
        self.get(path).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub(crate) fn geopoint(&self, path: &str) -> Option<GeoPoint> {
        self.get(path).and_then(GeoPoint::from_value)
    }
}

impl From<Map<String, Value>> for Document {
    /// Uses an already flattened map as is.
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().collect(),
        }
    }
}

impl GeoPoint {
    /// Accepts `[lat, lon]`, `{"lat", "lon"}`, `{"lat", "lng"}` and `"lat,lon"`.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let (lat, lon) = match value {
            Value::Array(pair) if pair.len() == 2 => (pair[0].as_f64()?, pair[1].as_f64()?),
            Value::Object(object) => (
                object.get("lat")?.as_f64()?,
                object.get("lon").or_else(|| object.get("lng"))?.as_f64()?,
            ),
            Value::String(text) => {
                let (lat, lon) = text.split_once(',')?;
                (lat.trim().parse().ok()?, lon.trim().parse().ok()?)
            }
            _ => return None,
        };
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}
