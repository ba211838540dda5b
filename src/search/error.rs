use std::path::PathBuf;
use thiserror::Error;

/// Failures at the boundary of the planner: reading tasks and configuration,
/// writing solutions and traces. The search itself never fails with an
/// error, it reports infeasibility through sentinel values.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse task file {path}: {source}")]
    RonTask {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to parse task file {path}: {source}")]
    JsonTask {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unsupported task file extension for {0}, expected .ron or .json")]
    UnknownTaskFormat(PathBuf),
    #[error("invalid task: {0}")]
    InvalidTask(String),
}

impl PlannerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
