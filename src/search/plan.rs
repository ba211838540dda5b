//! A timed plan is the list of real actions of a solution with their start
//! times. This module provides the [`TimedPlan`] struct and its PDDL-style
//! text form.

use itertools::Itertools;
use std::fmt;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq)]
pub struct TimedStep {
    pub start: f32,
    pub name: String,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedPlan {
    /// Sorted by start time.
    steps: Vec<TimedStep>,
    makespan: f32,
    cost: f32,
}

impl TimedPlan {
    pub fn new(steps: Vec<TimedStep>, makespan: f32, cost: f32) -> Self {
        let steps = steps
            .into_iter()
            .sorted_by(|a, b| a.start.total_cmp(&b.start))
            .collect();
        Self {
            steps,
            makespan,
            cost,
        }
    }

    pub fn steps(&self) -> &[TimedStep] {
        &self.steps
    }

    pub fn makespan(&self) -> f32 {
        self.makespan
    }

    pub fn cost(&self) -> f32 {
        self.cost
    }
}

impl Deref for TimedPlan {
    type Target = [TimedStep];

    fn deref(&self) -> &Self::Target {
        &self.steps
    }
}

impl fmt::Display for TimedPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(
                f,
                "{:.3}: ({}) [{:.3}]",
                step.start, step.name, step.duration
            )?;
        }
        writeln!(f, ";Makespan: {:.3}", self.makespan)?;
        write!(f, ";Cost: {:.3}", self.cost)
    }
}
