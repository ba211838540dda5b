mod memoization;
mod plan_node;
mod planner;
mod planner_setting;
mod plateau;
mod search_queue;
mod search_statistics;
mod selector;
mod successors;
mod termination_condition;
pub(crate) mod timeline;

pub use memoization::Memoization;
pub use plan_node::{
    end_point, first_point, ordering, second_point, start_point, step_of, ActionRef, CausalLink,
    OpenCond, Ordering, Plan, PlanId, PlanTree, TimePoint,
};
pub use planner::{Planner, Strategy};
pub use planner_setting::{fictitious_actions, select_strategy, PlannerSetting};
pub use plateau::{Plateau, PlateauOutcome};
pub use search_queue::{QueueKind, QueueOrdering, SearchQueue};
pub use search_statistics::SearchStatistics;
pub use selector::{PlateauSelector, QualitySelector, Selector};
pub use successors::{Expansion, Successors};
pub use termination_condition::{TerminationCondition, TerminationReason};
