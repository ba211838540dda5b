use crate::search::heuristics::HeuristicName;
use crate::search::PlannerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Planner options, read from a TOML file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlannerConfig {
    /// Wall-clock limit in seconds for the whole run.
    pub time_limit: Option<f64>,
    pub memory_limit_mb: Option<usize>,
    /// Dump of every expanded plan, only written by the reversible strategy.
    pub trace_file: Option<PathBuf>,
    pub heuristic: HeuristicName,
    /// Iterations without improvement before a plateau search starts.
    pub plateau_start: Option<u32>,
    /// Iterations without improvement after which a plateau search is given
    /// up.
    pub plateau_limit: Option<u32>,
    /// Keep searching for cheaper plans after the first one is found.
    pub anytime: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            memory_limit_mb: None,
            trace_file: None,
            heuristic: HeuristicName::Ff,
            plateau_start: None,
            plateau_limit: None,
            anytime: true,
        }
    }
}

impl PlannerConfig {
    pub fn load(path: &Path) -> Result<Self, PlannerError> {
        let text = std::fs::read_to_string(path).map_err(|e| PlannerError::io(path, e))?;
        toml::from_str(&text).map_err(|source| PlannerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
            .map(|seconds| Duration::from_secs_f64(seconds.max(0.)))
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit.as_secs_f64());
        self
    }
}
