use thiserror::Error;

/// Parse failures for the string forms of scheduling inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CadenceError {
    #[error("unknown release template `{0}`")]
    UnknownTemplate(String),
    #[error("unknown time period `{0}`")]
    UnknownPeriod(String),
    #[error("invalid clock time `{0}`, expected HH:mm")]
    InvalidClockTime(String),
    #[error("invalid cohort anchor `{0}`")]
    InvalidAnchor(String),
}
