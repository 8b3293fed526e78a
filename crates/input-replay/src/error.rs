use devtools_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Unknown key: \"{0}\"")]
    UnknownKey(String),

    /// A rejected or failed protocol call, passed through untouched.
    #[error(transparent)]
    Session(#[from] SessionError),
}
