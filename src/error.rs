//! Error types shared by every proxy operation

use thiserror::Error;

use crate::kind::ElementKind;

/// Error type for arrayproxy
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A value of the wrong dynamic type was supplied
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A value cannot be stored in a slot of the given element kind
    #[error("cannot convert {value} to {kind}")]
    Conversion {
        /// Element kind of the target slot
        kind: ElementKind,
        /// Rendering of the rejected value
        value: String,
    },
    /// The requested array cannot be allocated
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// An index or window lies outside the array
    #[error("index out of bounds: {0}")]
    Bounds(String),
    /// Malformed JSON input
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    pub(crate) fn type_mismatch(found: &crate::Value, expected: &str) -> Self {
        ProxyError::TypeMismatch(format!(
            "no implicit conversion of {} into {}",
            found.type_name(),
            expected
        ))
    }

    pub(crate) fn conversion(kind: ElementKind, value: &crate::Value) -> Self {
        ProxyError::Conversion {
            kind,
            value: value.inspect(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;
