use crate::search::heuristics::{DtgSet, FfHeuristic, Relaxation};
use crate::search::{State, Task};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::rc::Rc;

pub type HeuristicValue = OrderedFloat<f32>;

pub trait Heuristic: Debug {
    /// Evaluate the given state, reached by a plan ending at `makespan`.
    fn evaluate(&mut self, state: &State, makespan: f32) -> HeuristicValue;
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicName {
    #[clap(name = "ff", help = "Relaxed plan length over the cost relaxed planning graph.")]
    Ff,
    #[clap(help = "Sum of domain transition graph distances, guided by the causal graph.")]
    CausalGraph,
}

impl HeuristicName {
    pub fn create(&self, task: Rc<Task>, relaxation: Rc<Relaxation>) -> Box<dyn Heuristic> {
        match self {
            HeuristicName::Ff => Box::new(FfHeuristic::with_relaxation(task, relaxation)),
            HeuristicName::CausalGraph => Box::new(DtgSet::new(task)),
        }
    }
}
