use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("no open browser session")]
    NotOpen,
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("element `{selector}` not found within {waited:?}")]
    ElementMissing { selector: String, waited: Duration },
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::Protocol(err.to_string())
    }
}

/// Failure of a step whose result the job never depends on.
#[derive(Debug, Error)]
#[error("{step} skipped: {source}")]
pub struct BestEffortError {
    pub step: &'static str,
    #[source]
    pub source: DriverError,
}

impl BestEffortError {
    pub fn new(step: &'static str, source: DriverError) -> Self {
        Self { step, source }
    }
}
