use devtools_session::SessionError;
use input_replay::InputError;
use remote_object::CoercionError;
use thiserror::Error;

/// Errors surfaced by the page facade.
#[derive(Debug, Error)]
pub enum DomError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Node is either not visible or not an HTMLElement")]
    NotVisible,

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element handle has no remote object id")]
    Detached,
}

impl DomError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DomError::Timeout(_))
    }
}
