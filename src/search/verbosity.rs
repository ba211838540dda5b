use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// How much the planner reports while searching.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Silent,
    /// Search progress and solutions.
    Normal,
    /// Plateau searches, strategy choice and heuristic details.
    Verbose,
    /// Every expansion.
    Debug,
}

impl From<Verbosity> for tracing::Level {
    fn from(value: Verbosity) -> Self {
        match value {
            Verbosity::Silent => tracing::Level::ERROR,
            Verbosity::Normal => tracing::Level::INFO,
            Verbosity::Verbose => tracing::Level::DEBUG,
            Verbosity::Debug => tracing::Level::TRACE,
        }
    }
}

impl Verbosity {
    /// The filter for this verbosity. A `RUST_LOG` directive takes precedence.
    pub fn env_filter(self) -> EnvFilter {
        let level = LevelFilter::from_level(self.into());
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    }
}
