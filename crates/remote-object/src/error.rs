use thiserror::Error;

/// Failures while turning a remote object into a Rust value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoercionError {
    #[error("Unsupported unserializable value: {0}")]
    UnsupportedValue(String),

    #[error("Unknown remote object type: {0}")]
    UnknownType(String),

    #[error("Cannot convert {found} to {expected}")]
    Incompatible {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Structural decode failed: {0}")]
    Deserialize(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

impl CoercionError {
    pub(crate) fn incompatible(expected: &'static str, found: &'static str) -> Self {
        CoercionError::Incompatible { expected, found }
    }
}
