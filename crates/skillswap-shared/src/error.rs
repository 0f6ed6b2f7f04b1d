use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SharedError {
    #[error("Empty identifier")]
    EmptyId,

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Unknown recording status: {0}")]
    UnknownRecordingStatus(String),
}
