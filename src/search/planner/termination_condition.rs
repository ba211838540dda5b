use memory_stats::memory_stats;
use std::time::{Duration, Instant};
use strum_macros::Display;
use tracing::info;

/// Why a search stopped before exhausting its frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TerminationReason {
    TimeLimitExceeded,
    MemoryLimitExceeded,
}

#[derive(Debug)]
pub struct TerminationCondition {
    time_limit: Option<Duration>,
    memory_limit_mb: Option<usize>,
    start_time: Instant,
    peak_memory_usage_mb: Option<usize>,
    last_log_time: Instant,
}

impl TerminationCondition {
    pub fn new(time_limit: Option<Duration>, memory_limit_mb: Option<usize>) -> Self {
        info!(
            time_limit = time_limit.map(|d| d.as_secs_f64()),
            memory_limit_mb = memory_limit_mb,
        );
        Self {
            time_limit,
            memory_limit_mb,
            start_time: Instant::now(),
            peak_memory_usage_mb: None,
            last_log_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_if_needed(&mut self) {
        if self.last_log_time.elapsed() > Duration::from_secs(10) {
            self.last_log_time = Instant::now();
            self.log();
        }
    }

    pub fn log(&mut self) {
        let memory_usage = memory_stats().map(|usage| usage.physical_mem / 1024 / 1024);
        self.peak_memory_usage_mb = self.peak_memory_usage_mb.max(memory_usage);
        info!(
            memory_usage_mb = memory_usage,
            time_elapsed = self.elapsed().as_secs_f64(),
        );
    }

    pub fn finalise(&mut self) {
        info!(
            peak_recorded_memory_usage_mb = self.peak_memory_usage_mb,
            total_time_used = self.elapsed().as_secs_f64(),
        );
    }

    pub fn should_terminate(&self) -> Option<TerminationReason> {
        if let Some(time_limit) = self.time_limit {
            if self.start_time.elapsed() >= time_limit {
                return Some(TerminationReason::TimeLimitExceeded);
            }
        }
        if let Some(memory_limit_mb) = self.memory_limit_mb {
            if let Some(peak_usage) = self.peak_memory_usage_mb {
                if peak_usage > memory_limit_mb {
                    return Some(TerminationReason::MemoryLimitExceeded);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_time_limit_terminates() {
        let condition = TerminationCondition::new(Some(Duration::ZERO), None);
        assert_eq!(
            condition.should_terminate(),
            Some(TerminationReason::TimeLimitExceeded)
        );
        let condition = TerminationCondition::new(None, None);
        assert_eq!(condition.should_terminate(), None);
        assert_eq!(
            TerminationReason::MemoryLimitExceeded.to_string(),
            "memory-limit-exceeded"
        );
    }
}
