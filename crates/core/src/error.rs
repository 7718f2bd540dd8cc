use thiserror::Error;

/// Local persistence failure. Retryable on the next scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Failure reported by the remote catalog or archive client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("provider error: {0}")]
    Provider(String),
}

/// Why a scrape or asset fetch ended in `Failed`.
///
/// Cloneable so one outcome can be handed to every caller that waited on the
/// same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// The fetch holding the lock was dropped before it published a result.
    #[error("in-flight fetch ended without a result")]
    Abandoned,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote_error",
            Self::Store(_) => "store_error",
            Self::Abandoned => "abandoned",
        }
    }
}
