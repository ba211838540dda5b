use crate::search::heuristics::{CostRpg, Heuristic, HeuristicValue, Relaxation};
use crate::search::{Fact, State, Task, EPSILON};
use ordered_float::OrderedFloat;
use std::collections::HashSet;
use std::rc::Rc;

/// FF-style heuristic: the number of actions in a relaxed plan extracted
/// from the cost relaxed planning graph.
#[derive(Debug)]
pub struct FfHeuristic {
    task: Rc<Task>,
    relaxation: Rc<Relaxation>,
    /// Actions of the last relaxed plan, in extraction order.
    relaxed_plan: Vec<usize>,
}

impl FfHeuristic {
    pub fn new(task: Rc<Task>) -> Self {
        Self::with_relaxation(task, Rc::new(Relaxation::default()))
    }

    pub fn with_relaxation(task: Rc<Task>, relaxation: Rc<Relaxation>) -> Self {
        Self {
            task,
            relaxation,
            relaxed_plan: vec![],
        }
    }

    pub fn relaxed_plan(&self) -> &[usize] {
        &self.relaxed_plan
    }

    /// Relaxed plan length for reaching every fact in `goals`, used to rank
    /// plans by a chosen subset of the goal.
    pub fn evaluate_facts(&mut self, state: &State, makespan: f32, goals: &[Fact]) -> HeuristicValue {
        self.relaxed_plan.clear();
        if state.satisfies_all(goals) {
            return OrderedFloat(0.);
        }
        let rpg = CostRpg::build_relaxed(&self.task, state, makespan, &self.relaxation);
        if rpg.cost_of(goals).is_none() {
            return OrderedFloat(f32::INFINITY);
        }
        self.extract(&rpg, goals)
    }

    /// Actions of the last relaxed plan that can start in `state`.
    pub fn helpful_actions(&self, state: &State) -> Vec<usize> {
        self.relaxed_plan
            .iter()
            .copied()
            .filter(|&index| {
                let action = &self.task.actions[index];
                state.satisfies_all(action.start_cond.iter().chain(action.over_cond.iter()))
            })
            .collect()
    }

    fn extract(&mut self, rpg: &CostRpg, goals: &[Fact]) -> HeuristicValue {
        let task = self.task.clone();
        let force_end = self.relaxation.force_end_conditions;
        let mut in_plan = HashSet::new();
        let mut visited = HashSet::new();
        let mut open: Vec<Fact> = goals.iter().filter(|g| !rpg.is_seed(g)).copied().collect();

        while let Some(fact) = open.pop() {
            if rpg.is_seed(&fact) || !visited.insert(fact) {
                continue;
            }
            // Cheapest achiever, measured at the time its effect appears.
            let achiever = task.producers[fact.var as usize][fact.value as usize]
                .iter()
                .filter_map(|&index| {
                    let level = rpg.action_level(index)?;
                    let action = &task.actions[index];
                    let offset = if action.start_eff.contains(&fact) {
                        EPSILON
                    } else {
                        EPSILON + rpg.action_cost(index)
                    };
                    Some((index, OrderedFloat(level + offset)))
                })
                .min_by_key(|&(index, level)| (level, index));
            let Some((index, _)) = achiever else {
                self.relaxed_plan.clear();
                return OrderedFloat(f32::INFINITY);
            };
            if in_plan.insert(index) {
                self.relaxed_plan.push(index);
                let action = &task.actions[index];
                let end_cond = if force_end { &action.end_cond[..] } else { &[] };
                open.extend(
                    action
                        .start_cond
                        .iter()
                        .chain(action.over_cond.iter())
                        .chain(end_cond)
                        .filter(|c| !rpg.is_seed(c)),
                );
            }
        }
        OrderedFloat(self.relaxed_plan.len() as f32)
    }
}

impl Heuristic for FfHeuristic {
    /// Evaluates the cheapest goal description in the relaxed graph.
    fn evaluate(&mut self, state: &State, makespan: f32) -> HeuristicValue {
        self.relaxed_plan.clear();
        let task = self.task.clone();
        if task
            .goals
            .iter()
            .any(|goal| state.satisfies_all(goal.all_conditions()))
        {
            return OrderedFloat(0.);
        }
        let rpg = CostRpg::build_relaxed(&task, state, makespan, &self.relaxation);
        let best_goal = task
            .goals
            .iter()
            .filter_map(|goal| {
                rpg.cost_of(goal.all_conditions())
                    .map(|cost| (OrderedFloat(cost), goal))
            })
            .min_by_key(|(cost, _)| *cost);
        match best_goal {
            Some((_, goal)) => {
                let facts: Vec<Fact> = goal.all_conditions().copied().collect();
                self.extract(&rpg, &facts)
            }
            None => OrderedFloat(f32::INFINITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn chain_relaxed_plan() {
        let task = Rc::new(chain_task());
        let mut ff = FfHeuristic::new(task.clone());
        let mut state = task.initial_state();

        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(2.));
        assert_eq!(ff.relaxed_plan(), &[1, 0]);
        // Only a1 can start right away
        assert_eq!(ff.helpful_actions(&state), vec![0]);

        state.set(&Fact::new(1, 1));
        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(1.));
        state.set(&Fact::new(2, 1));
        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(0.));
    }

    #[test]
    fn subset_of_goals() {
        let task = Rc::new(chain_task());
        let mut ff = FfHeuristic::new(task.clone());
        let state = task.initial_state();
        assert_eq!(
            ff.evaluate_facts(&state, 0., &[Fact::new(1, 1)]),
            OrderedFloat(1.)
        );
        assert_eq!(
            ff.evaluate_facts(&state, 0., &[Fact::new(0, 0)]),
            OrderedFloat(f32::INFINITY)
        );
    }

    #[test]
    fn time_initial_literal_window() {
        let task = Rc::new(til_window_task());
        let tils = crate::search::planner::fictitious_actions(&task)
            .into_iter()
            .skip(1)
            .collect();
        let relaxation = Rc::new(Relaxation {
            force_end_conditions: false,
            tils,
        });
        let state = task.initial_state();
        let mut blind = FfHeuristic::new(task.clone());
        assert_eq!(blind.evaluate(&state, 0.), OrderedFloat(f32::INFINITY));

        let mut ff = FfHeuristic::with_relaxation(task.clone(), relaxation);
        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(1.));
        assert_eq!(ff.relaxed_plan(), &[0]);
        // go cannot start before the light comes on
        assert!(ff.helpful_actions(&state).is_empty());
        assert_eq!(ff.evaluate(&state, 10.), OrderedFloat(f32::INFINITY));
    }

    #[test]
    fn forced_end_conditions_join_the_relaxed_plan() {
        let task = Rc::new(end_condition_task());
        let state = task.initial_state();
        let mut relaxed = FfHeuristic::new(task.clone());
        assert_eq!(relaxed.evaluate(&state, 0.), OrderedFloat(1.));

        let relaxation = Rc::new(Relaxation {
            force_end_conditions: true,
            tils: vec![],
        });
        let mut forced = FfHeuristic::with_relaxation(task.clone(), relaxation);
        // wait also needs ping for its end condition
        assert_eq!(forced.evaluate(&state, 0.), OrderedFloat(2.));
        assert_eq!(forced.relaxed_plan(), &[0, 1]);
    }

    #[test]
    fn dead_end_is_infinite() {
        let task = Rc::new(dead_end_task());
        let mut ff = FfHeuristic::new(task.clone());
        let mut state = task.initial_state();
        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(2.));
        state.set(&Fact::new(0, 2));
        assert_eq!(ff.evaluate(&state, 0.), OrderedFloat(f32::INFINITY));
    }
}
