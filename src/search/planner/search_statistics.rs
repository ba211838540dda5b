use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug)]
pub struct SearchStatistics {
    /// Number of plans expanded
    expanded_nodes: usize,
    /// Number of plans evaluated by the heuristics
    evaluated_nodes: usize,
    /// Number of successor plans built
    generated_nodes: usize,
    /// Number of successors dropped as repeated states
    repeated_states: usize,
    /// Number of plateau searches started
    plateaus: usize,
    /// Number of plateau searches that improved the frontier
    plateau_successes: usize,
    /// Time when the search started
    search_start_time: Instant,
    /// Time when the last log was printed, used for periodic logging
    last_log_time: Instant,
}

impl Default for SearchStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStatistics {
    pub fn new() -> Self {
        info!("starting search");
        Self {
            expanded_nodes: 0,
            evaluated_nodes: 0,
            generated_nodes: 0,
            repeated_states: 0,
            plateaus: 0,
            plateau_successes: 0,
            search_start_time: Instant::now(),
            last_log_time: Instant::now(),
        }
    }

    pub fn expanded_nodes(&self) -> usize {
        self.expanded_nodes
    }

    pub fn increment_expanded_nodes(&mut self) {
        self.expanded_nodes += 1;
        self.log_if_needed();
    }

    pub fn increment_evaluated_nodes(&mut self) {
        self.evaluated_nodes += 1;
        self.log_if_needed();
    }

    pub fn increment_generated_nodes(&mut self, num_nodes: usize) {
        self.generated_nodes += num_nodes;
        self.log_if_needed();
    }

    pub fn increment_repeated_states(&mut self) {
        self.repeated_states += 1;
    }

    pub fn plateaus(&self) -> usize {
        self.plateaus
    }

    pub fn increment_plateaus(&mut self) {
        self.plateaus += 1;
    }

    pub fn increment_plateau_successes(&mut self) {
        self.plateau_successes += 1;
    }

    fn log_if_needed(&mut self) {
        if self.last_log_time.elapsed() > Duration::from_secs(10) {
            self.log();
        }
    }

    pub fn log(&mut self) {
        self.last_log_time = Instant::now();
        info!(
            expanded_nodes = self.expanded_nodes,
            evaluated_nodes = self.evaluated_nodes,
            generated_nodes = self.generated_nodes,
            repeated_states = self.repeated_states,
            plateaus = self.plateaus,
            plateau_successes = self.plateau_successes,
        );
    }

    pub fn finalise_search(&mut self) {
        info!("finalising search");
        self.log();
        info!(search_duration = self.search_start_time.elapsed().as_secs_f64());
    }
}
