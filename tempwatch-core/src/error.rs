use thiserror::Error;

/// Malformed input at the dataset boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown season '{0}'. Expected one of: winter, spring, summer, autumn.")]
    UnknownSeason(String),

    #[error("Unparseable timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Invalid parameters passed to an analysis routine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Rolling window must be at least 1, got {0}")]
    InvalidWindow(usize),

    #[error("Anomaly threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Why a single live fetch failed. Converted into a failure observation by the client.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse weather response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{message}")]
    Upstream { message: String, code: Option<u16> },
}

impl FetchError {
    pub fn code(&self) -> Option<u16> {
        match self {
            FetchError::Network(err) => err.status().map(|status| status.as_u16()),
            FetchError::Decode(_) => None,
            FetchError::Upstream { code, .. } => *code,
        }
    }
}
