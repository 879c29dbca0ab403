use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum PercolatorError {
    #[error("filter is too complex: {count} conditions exceed the maximum of {max}")]
    FilterTooComplex { count: usize, max: usize },
    #[error("invalid predicate on field {field:?}: {reason}")]
    InvalidPredicate { field: String, reason: String },
    #[error("malformed filter: {0}")]
    MalformedFilter(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PercolatorError {
    pub(crate) fn invalid_predicate(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PercolatorError>;
