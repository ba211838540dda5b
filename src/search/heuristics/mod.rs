mod causal_graph;
mod cost_rpg;
mod dtg;
mod evaluator;
mod heuristic;
mod landmarks;
mod relaxed_plan;

pub use causal_graph::CausalGraph;
pub use cost_rpg::{CostRpg, Relaxation};
pub use dtg::{Dtg, DtgSet};
pub use evaluator::{Evaluation, Evaluator};
pub use heuristic::{Heuristic, HeuristicName, HeuristicValue};
pub use landmarks::{LandmarkGraph, LandmarkSet};
pub use relaxed_plan::FfHeuristic;
