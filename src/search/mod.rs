mod config;
mod error;
pub mod heuristics;
pub mod plan;
pub mod planner;
mod state;
mod task;
mod verbosity;

pub use config::PlannerConfig;
pub use error::PlannerError;
pub use state::State;
pub use task::{
    fact_code, fact_code_value, fact_code_var, Action, ActionCost, Comparator, Fact, FactCode,
    NumVarId, NumericCondition, NumericEffect, NumericOp, NumericVariable, Task, TaskDescription,
    ValueId, VarId, Variable, EPSILON, UNDEFINED_VALUE,
};
pub use verbosity::Verbosity;
