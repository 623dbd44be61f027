/// Error types shared across the service
use thiserror::Error;

/// Problems found while loading the service configuration. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{name} must be a positive whole number of seconds, got '{value}'")]
    InvalidInterval { name: &'static str, value: String },
    #[error("update interval ({latest}s) must be shorter than persist interval ({history}s)")]
    IntervalOrder { latest: u64, history: u64 },
    #[error("scheduler tick ({tick}s) must not exceed the update interval ({latest}s)")]
    TickTooLong { tick: u64, latest: u64 },
}

/// Failures of the advertisement source. The service cannot collect data
/// without it, so these end the process.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
    #[error("advertisement stream ended unexpectedly")]
    StreamEnded,
    #[error("scanner was not started")]
    NotStarted,
    #[error("no advertisement callback subscribed")]
    NoSubscriber,
    #[error("scanner task failed: {0}")]
    TaskFailed(String),
}

/// Failure of a single sink call. Logged by the scheduler, never retried.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected write: {0}")]
    Rejected(String),
}

impl From<tokio_postgres::Error> for SinkError {
    fn from(e: tokio_postgres::Error) -> Self {
        // Server-side errors carry a database error; everything else is transport
        if e.as_db_error().is_some() {
            SinkError::Rejected(e.to_string())
        } else {
            SinkError::Unavailable(e.to_string())
        }
    }
}

impl SinkError {
    /// Whether the connection that produced this error should be discarded.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}
