/// Errors from canonical encoding and parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CanonError {
    /// Keys beginning with `$` are reserved for placeholders.
    #[error("reserved key in property {key:?}")]
    ReservedKey { key: String },

    /// NaN and infinities have no canonical encoding.
    #[error("non-finite float in property {key:?}")]
    NonFiniteFloat { key: String },

    /// A child node was left in place instead of a reference.
    #[error("unresolved child node in property {key:?}")]
    UnresolvedChild { key: String },

    /// Canonical bytes must encode a JSON object at the top level.
    #[error("canonical form is not an object")]
    NotAnObject,

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for CanonError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Result alias for canonicalization.
pub type CanonResult<T> = Result<T, CanonError>;
