//! Entry point of the search: builds the fictitious initial plan, analyses
//! the task to pick a strategy and runs the matching planner.

use crate::search::heuristics::CostRpg;
use crate::search::plan::TimedPlan;
use crate::search::planner::{PlanId, Planner, Strategy, Successors, TerminationCondition};
use crate::search::{
    Action, ActionCost, Fact, NumVarId, NumericEffect, NumericOp, PlannerConfig, PlannerError,
    Task, VarId,
};
use std::rc::Rc;
use tracing::info;

/// The action setting the initial state at time zero, followed by one action
/// per time-initial literal time, in time order. Each action comes with the
/// time at which its effects hold.
pub fn fictitious_actions(task: &Task) -> Vec<(Action, f32)> {
    let mut times: Vec<f32> = task
        .variables
        .iter()
        .flat_map(|var| var.timed_values.iter().map(|(_, time)| *time))
        .chain(
            task.numeric_variables
                .iter()
                .flat_map(|var| var.timed_values.iter().map(|(_, time)| *time)),
        )
        .filter(|time| *time > 0.)
        .collect();
    times.sort_by(f32::total_cmp);
    times.dedup();

    let initial = fictitious_action(task, "#initial".to_string(), 0., false);
    std::iter::once((initial, 0.))
        .chain(times.into_iter().map(|time| {
            let name = format!("#til{time:.6}");
            (fictitious_action(task, name, time, true), time)
        }))
        .collect()
}

fn fictitious_action(task: &Task, name: String, time: f32, is_til: bool) -> Action {
    let end_eff = task
        .variables
        .iter()
        .enumerate()
        .filter_map(|(var, variable)| {
            variable
                .timed_values
                .iter()
                .find(|(_, t)| *t == time)
                .map(|(value, _)| Fact::new(var as VarId, *value))
        })
        .collect();
    let end_num_eff = task
        .numeric_variables
        .iter()
        .enumerate()
        .filter_map(|(var, variable)| {
            variable
                .timed_values
                .iter()
                .find(|(_, t)| *t == time)
                .map(|(value, _)| NumericEffect {
                    var: var as NumVarId,
                    op: NumericOp::Assign,
                    value: *value,
                })
        })
        .collect();
    Action {
        name,
        duration: 0.,
        end_eff,
        end_num_eff,
        cost: ActionCost::Fixed(0.),
        is_til,
        ..Default::default()
    }
}

#[derive(Debug)]
pub struct PlannerSetting {
    task: Rc<Task>,
    force_at_end_conditions: bool,
    filter_repeated_states: bool,
    planner: Planner,
}

impl PlannerSetting {
    pub fn new(task: Task, config: &PlannerConfig) -> Result<Self, PlannerError> {
        let termination = TerminationCondition::new(config.time_limit(), config.memory_limit_mb);
        let task = Rc::new(task);
        let force_at_end_conditions = check_force_at_end_conditions(&task);
        let filter_repeated_states = check_repeated_states(&task);
        let strategy = select_strategy(&task, force_at_end_conditions, filter_repeated_states);
        info!(
            force_at_end_conditions = force_at_end_conditions,
            filter_repeated_states = filter_repeated_states,
            permanent_mutex_action = task.has_permanent_mutex_action(),
            strategy = %strategy,
        );
        let successors = Successors::new(
            task.clone(),
            config.heuristic,
            force_at_end_conditions,
            filter_repeated_states,
        );
        let planner = Planner::new(strategy, successors, config, termination)?;
        Ok(Self {
            task,
            force_at_end_conditions,
            filter_repeated_states,
            planner,
        })
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn strategy(&self) -> Strategy {
        self.planner.strategy()
    }

    pub fn force_at_end_conditions(&self) -> bool {
        self.force_at_end_conditions
    }

    pub fn filter_repeated_states(&self) -> bool {
        self.filter_repeated_states
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn plan(&mut self) -> Option<PlanId> {
        self.planner.plan()
    }

    pub fn improve_solution(&mut self, best_g: u32, best_gc: f32, first: bool) -> Option<PlanId> {
        self.planner.improve_solution(best_g, best_gc, first)
    }

    pub fn plan_to_pddl(&self, id: PlanId) -> TimedPlan {
        self.planner.plan_to_pddl(id)
    }

    pub fn expanded_nodes(&self) -> usize {
        self.planner.expanded_nodes()
    }

    pub fn finalise(&mut self) {
        self.planner.finalise();
    }
}

/// End conditions can be required to hold when an action starts if some
/// goal stays reachable in the relaxed problem under that restriction.
fn check_force_at_end_conditions(task: &Task) -> bool {
    let facts: Vec<Fact> = fictitious_actions(task)
        .into_iter()
        .flat_map(|(action, _)| action.end_eff)
        .collect();
    let numeric = task.initial_state().numeric;
    let rpg = CostRpg::build_forcing_end_conditions(task, &facts, &numeric, 0.);
    task.goals
        .iter()
        .any(|goal| goal.all_conditions().all(|fact| rpg.fact_reached(fact)))
}

/// States can be compared when no action sets a value at its start that
/// another action relies on and then overwrites it at its end.
fn check_repeated_states(task: &Task) -> bool {
    task.actions.iter().enumerate().all(|(index, action)| {
        action.start_eff.iter().all(|start| {
            !action
                .end_eff
                .iter()
                .any(|end| end.var == start.var && end.value != start.value)
                || task.requirers[start.var as usize][start.value as usize]
                    .iter()
                    .all(|&requirer| requirer == index)
        })
    })
}

pub fn select_strategy(
    task: &Task,
    force_at_end_conditions: bool,
    filter_repeated_states: bool,
) -> Strategy {
    if !filter_repeated_states || !force_at_end_conditions {
        Strategy::Concurrent
    } else if task.has_permanent_mutex_action() {
        Strategy::DeadEnds
    } else {
        Strategy::Reversible
    }
}
