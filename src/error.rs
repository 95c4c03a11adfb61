use crate::response::Path;
use std::fmt;
use std::time::Duration;

/// Everything that can end a fetch, per attempt or for the whole race.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid proxy url {url:?}: {reason}")]
    Config { url: String, reason: String },

    #[error("cannot build request: {0}")]
    RequestBuild(String),

    #[error("{path} request failed: {source}")]
    Transport {
        path: Path,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} response body is empty")]
    EmptyResponse { path: Path },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("both attempts failed: {}", join_failures(.0))]
    Aggregated(Vec<AttemptFailure>),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    /// Per-path failures in arrival order. Empty unless aggregated.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            FetchError::Aggregated(failures) => failures,
            _ => &[],
        }
    }
}

/// Why one path of a race gave up.
#[derive(Debug)]
pub struct AttemptFailure {
    pub path: Path,
    pub error: FetchError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Transport and empty-body errors already carry the path
        match &self.error {
            FetchError::Transport { .. } | FetchError::EmptyResponse { .. } => {
                write!(f, "{}", self.error)
            }
            other => write!(f, "{}: {}", self.path, other),
        }
    }
}

fn join_failures(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}
