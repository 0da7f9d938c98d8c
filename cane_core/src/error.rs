use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaneError {
    #[error("link unavailable: {0}")]
    LinkUnavailable(String),
    #[error("serial read timeout")]
    ReadTimeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("calibration timed out after {0} ms")]
    CalibrationTimeout(u64),
    #[error("calibration rejected: {0}")]
    CalibrationRejected(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing link")]
    MissingLink,
    #[error("missing config")]
    MissingConfig,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
