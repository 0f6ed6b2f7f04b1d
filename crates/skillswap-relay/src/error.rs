use thiserror::Error;

/// Failures reported by external collaborators.
///
/// The relay never propagates these to the transport: each handler resolves
/// them where they are detected (usually by dropping the event).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),
}
