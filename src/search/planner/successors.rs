//! Successor generation. A successor adds one action to a plan, scheduled at
//! the earliest time at which all its conditions can be supported without
//! breaking any condition of the steps already in the plan.

use crate::search::heuristics::{Evaluator, HeuristicName, Relaxation};
use crate::search::planner::timeline::{Step, Timeline};
use crate::search::planner::{
    end_point, fictitious_actions, ordering, start_point, ActionRef, CausalLink, Memoization,
    OpenCond, Plan, PlanId, PlanTree, SearchStatistics,
};
use crate::search::{Action, Fact, Task, VarId, EPSILON};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::rc::Rc;
use tracing::trace;

/// Children added to the tree by one expansion.
#[derive(Debug, Default)]
pub struct Expansion {
    pub children: Vec<PlanId>,
    /// A child that is a complete solution, if any.
    pub solution: Option<PlanId>,
}

#[derive(Debug)]
pub struct Successors {
    task: Rc<Task>,
    /// The initial state action followed by the time-initial literal actions.
    fictitious: Vec<Action>,
    fictitious_times: Vec<f32>,
    evaluator: Evaluator,
    memo: Memoization,
    force_at_end_conditions: bool,
    filter_repeated_states: bool,
}

impl Successors {
    pub fn new(
        task: Rc<Task>,
        heuristic: HeuristicName,
        force_at_end_conditions: bool,
        filter_repeated_states: bool,
    ) -> Self {
        let actions = fictitious_actions(&task);
        let relaxation = Relaxation {
            force_end_conditions: force_at_end_conditions,
            tils: actions[1..].to_vec(),
        };
        let evaluator = Evaluator::new(task.clone(), &task.initial_state(), heuristic, relaxation);
        let (fictitious, fictitious_times): (Vec<Action>, Vec<f32>) = actions.into_iter().unzip();
        Self {
            task,
            fictitious,
            fictitious_times,
            evaluator,
            memo: Memoization::new(),
            force_at_end_conditions,
            filter_repeated_states,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    pub fn num_tils(&self) -> usize {
        self.fictitious.len() - 1
    }

    pub fn action(&self, action: ActionRef) -> &Action {
        action.resolve(&self.task, &self.fictitious)
    }

    /// The tree holding the initial plan: the initial state action followed
    /// by one node per time-initial literal time. The last node is
    /// evaluated and returned with the tree.
    pub fn initial_plan(&mut self) -> (PlanTree, PlanId) {
        let mut timeline = Timeline::new(&self.task, &self.fictitious);
        let fictitious_step = |index: usize, time: f32| Step {
            action: ActionRef::Fictitious(index),
            start: time,
            end: time,
        };
        let initial_time = self.fictitious_times[0];
        timeline.push_step(fictitious_step(0, initial_time));
        let mut tree = PlanTree::new(Plan::fictitious(0, initial_time, timeline.final_state()));
        for (index, &time) in self.fictitious_times.iter().enumerate().skip(1) {
            timeline.push_step(fictitious_step(index, time));
            let mut plan = Plan::fictitious(index, time, timeline.final_state());
            plan.orderings
                .push(ordering(end_point(index - 1), end_point(index)));
            tree.add_child(index - 1, plan);
        }
        let last = tree.len() - 1;
        let plan = tree.get(last);
        let evaluation = self
            .evaluator
            .evaluate(&plan.state, plan.makespan, &plan.landmarks);
        let plan = tree.get_mut(last);
        plan.h = evaluation.h;
        plan.h_aux = evaluation.h_aux;
        plan.h_land = evaluation.h_land;
        plan.landmarks = evaluation.landmarks;
        (tree, last)
    }

    /// Computes the successors of `base`, evaluates them and adds them to
    /// the tree. With `helpful_only` only the helpful actions of `base` are
    /// tried, unless there are none.
    pub fn expand(
        &mut self,
        tree: &mut PlanTree,
        base: PlanId,
        helpful_only: bool,
        statistics: &mut SearchStatistics,
    ) -> Expansion {
        let parent = tree.get(base);
        debug_assert!(!parent.expanded(), "plan {base} expanded twice");
        let mut actions = if helpful_only {
            self.evaluator
                .helpful_actions(&parent.state, parent.makespan)
        } else {
            vec![]
        };
        if actions.is_empty() {
            actions = (0..self.task.actions.len()).collect();
        }
        let candidates = (0..self.task.goals.len())
            .map(ActionRef::Goal)
            .chain(actions.into_iter().map(ActionRef::Task));

        let timeline = Timeline::from_plan(&self.task, &self.fictitious, tree, base);
        let plans: Vec<Plan> = candidates
            .filter_map(|action| self.generate(&timeline, parent, action))
            .collect();
        statistics.increment_expanded_nodes();
        statistics.increment_generated_nodes(plans.len());
        tree.set_expanded(base);

        let mut expansion = Expansion::default();
        for mut plan in plans {
            if plan.action.is_goal() {
                if plan.is_solution() && expansion.solution.is_none() {
                    plan.h = OrderedFloat(0.);
                    plan.h_land = 0;
                    expansion.solution = Some(tree.add_child(base, plan));
                }
                continue;
            }
            if self.filter_repeated_states
                && !plan.has_open_conditions()
                && !self.memo.insert(&plan.state, plan.gc)
            {
                statistics.increment_repeated_states();
                continue;
            }
            let evaluation = self
                .evaluator
                .evaluate(&plan.state, plan.makespan, &plan.landmarks);
            statistics.increment_evaluated_nodes();
            if evaluation.h.into_inner().is_infinite() && !plan.has_open_conditions() {
                continue;
            }
            plan.h = evaluation.h;
            plan.h_aux = evaluation.h_aux;
            plan.h_land = evaluation.h_land;
            plan.landmarks = evaluation.landmarks;
            expansion.children.push(tree.add_child(base, plan));
        }
        trace!(
            base = base,
            children = expansion.children.len(),
            solution = expansion.solution.is_some()
        );
        expansion
    }

    /// The plan adding `action` to `parent` at its earliest feasible time.
    fn generate(&self, timeline: &Timeline, parent: &Plan, action_ref: ActionRef) -> Option<Plan> {
        let action = self.action(action_ref);
        let start_conditions: Vec<Fact> = if action_ref.is_goal() {
            action.all_conditions().copied().collect()
        } else {
            action.start_cond.clone()
        };
        if !start_conditions.iter().all(|c| timeline.ever_holds(c)) {
            return None;
        }
        let earliest = if action_ref.is_goal() {
            timeline.last_start().max(parent.makespan + EPSILON)
        } else {
            timeline.last_start()
        };
        let mut trial = timeline.clone();
        timeline
            .candidate_epochs(earliest)
            .into_iter()
            .find_map(|start| {
                let end = if action_ref.is_goal() {
                    start
                } else {
                    start + action.duration
                };
                trial.push_step(Step {
                    action: action_ref,
                    start,
                    end,
                });
                let plan = self.schedule(timeline, &trial, parent, &start_conditions);
                trial.pop_step();
                plan
            })
    }

    /// The plan for the last step of `trial`, which is `timeline` with the
    /// new step added.
    fn schedule(
        &self,
        timeline: &Timeline,
        trial: &Timeline,
        parent: &Plan,
        start_conditions: &[Fact],
    ) -> Option<Plan> {
        let step = timeline.len();
        let Step {
            action: action_ref,
            start,
            end,
        } = trial.steps()[step];
        let action = self.action(action_ref);
        let is_goal = action_ref.is_goal();
        let mut causal_links: SmallVec<[CausalLink; 4]> = SmallVec::new();

        for condition in start_conditions {
            let producer = timeline.supporter(condition, start)?;
            causal_links.push(CausalLink::new(*condition, producer, start_point(step)));
        }
        let numeric_state = timeline.numeric_state_at(start);
        let numeric_conditions_hold = action
            .start_num_cond
            .iter()
            .all(|c| c.holds(&numeric_state));

        if trial.has_conflicting_effects(step) {
            return None;
        }

        let mut open_conditions = vec![];
        if !is_goal {
            for condition in &action.over_cond {
                if !trial.holds_during(condition, start, end) {
                    return None;
                }
                let producer = trial.supporter(condition, start)?;
                causal_links.push(CausalLink::new(*condition, producer, start_point(step)));
            }
            for condition in &action.end_cond {
                match trial.supporter(condition, end) {
                    Some(producer) => {
                        causal_links.push(CausalLink::new(*condition, producer, end_point(step)))
                    }
                    None if self.force_at_end_conditions => return None,
                    None => open_conditions.push(OpenCond {
                        step,
                        fact: *condition,
                    }),
                }
            }
        }

        let parent_open = parent.open_cond.as_deref().unwrap_or(&[]);
        let affected: Vec<VarId> = action.all_effects().map(|f| f.var).unique().collect();
        if !affected.is_empty() {
            for (index, existing) in timeline.steps().iter().enumerate() {
                if existing.action.is_fictitious() {
                    continue;
                }
                let open_here: Vec<Fact> = parent_open
                    .iter()
                    .filter(|c| c.step == index)
                    .map(|c| c.fact)
                    .collect();
                if !trial.step_conditions_hold(index, &affected, &open_here) {
                    return None;
                }
            }
        }
        for open in parent_open {
            match trial.supporter(&open.fact, trial.steps()[open.step].end) {
                Some(producer) => causal_links.push(CausalLink::new(
                    open.fact,
                    producer,
                    end_point(open.step),
                )),
                None => open_conditions.push(*open),
            }
        }
        if is_goal && !open_conditions.is_empty() {
            return None;
        }

        let mut orderings = SmallVec::new();
        orderings.push(ordering(start_point(step - 1), start_point(step)));
        for link in &causal_links {
            if !orderings.contains(&link.ordering) {
                orderings.push(link.ordering);
            }
        }
        let makespan = if is_goal {
            parent.makespan
        } else {
            parent.makespan.max(end)
        };
        let cost = if is_goal {
            0.
        } else {
            self.task
                .compute_action_cost(action, &numeric_state, makespan)
        };

        Some(Plan {
            id: 0,
            parent: None,
            children: None,
            action: action_ref,
            fixed_end: None,
            start,
            end,
            makespan,
            orderings,
            causal_links,
            open_cond: (!open_conditions.is_empty()).then_some(open_conditions),
            unsatisfied_numeric_conditions: parent.unsatisfied_numeric_conditions
                || !numeric_conditions_hold,
            h: OrderedFloat(f32::INFINITY),
            h_aux: OrderedFloat(0.),
            h_land: 0,
            g: parent.g + u32::from(!is_goal),
            gc: parent.gc + cost,
            landmarks: parent.landmarks.clone(),
            state: trial.final_state(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::planner::step_of;
    use crate::test_utils::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn chain_root_has_one_successor() {
        let task = Rc::new(chain_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, true);
        let mut statistics = SearchStatistics::new();
        let (mut tree, root) = successors.initial_plan();
        assert_eq!(tree.get(root).h, OrderedFloat(2.));

        let expansion = successors.expand(&mut tree, root, false, &mut statistics);
        assert_eq!(expansion.solution, None);
        assert_eq!(expansion.children.len(), 1);
        let child = tree.get(expansion.children[0]);
        assert_eq!(child.action, ActionRef::Task(0));
        assert_eq!((child.start, child.end, child.makespan), (0., 2., 2.));
        assert_eq!((child.g, child.gc), (1, 2.));
        assert_eq!(child.state.values, vec![1, 1, 0]);
        assert_eq!(
            child.causal_links.as_slice(),
            &[CausalLink::new(Fact::new(0, 1), end_point(0), start_point(1))]
        );
        assert_eq!(child.h, OrderedFloat(1.));
        assert!(tree.get(root).expanded());
    }

    #[test]
    fn chain_reaches_goal_after_two_steps() {
        let task = Rc::new(chain_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, true);
        let mut statistics = SearchStatistics::new();
        let (mut tree, root) = successors.initial_plan();
        let first = successors.expand(&mut tree, root, false, &mut statistics).children[0];
        let expansion = successors.expand(&mut tree, first, false, &mut statistics);
        let second = *expansion
            .children
            .iter()
            .find(|&&id| tree.get(id).action == ActionRef::Task(1))
            .unwrap();
        let (start, makespan) = (tree.get(second).start, tree.get(second).makespan);
        // b = 1 is visible right after a1 ends
        assert_approx_eq!(start, 2. + EPSILON);
        assert_approx_eq!(makespan, 3. + EPSILON);

        let expansion = successors.expand(&mut tree, second, false, &mut statistics);
        let solution = tree.get(expansion.solution.unwrap());
        assert!(solution.is_solution());
        assert_eq!(solution.g, 2);
        assert_eq!(solution.gc, 5.);
        assert!(solution.start > makespan);
    }

    #[test]
    fn open_end_condition_is_recorded_then_closed() {
        let task = Rc::new(end_condition_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, false);
        let mut statistics = SearchStatistics::new();
        let (mut tree, root) = successors.initial_plan();
        let expansion = successors.expand(&mut tree, root, false, &mut statistics);
        let wait = *expansion
            .children
            .iter()
            .find(|&&id| tree.get(id).action == ActionRef::Task(0))
            .unwrap();
        assert_eq!(
            tree.get(wait).open_cond,
            Some(vec![OpenCond {
                step: 1,
                fact: Fact::new(1, 1)
            }])
        );

        let expansion = successors.expand(&mut tree, wait, false, &mut statistics);
        // the goal cannot be reached while the end condition is open
        assert_eq!(expansion.solution, None);
        let ping = *expansion
            .children
            .iter()
            .find(|&&id| tree.get(id).action == ActionRef::Task(1))
            .unwrap();
        let plan = tree.get(ping);
        assert!(!plan.has_open_conditions());
        assert!(plan
            .causal_links
            .iter()
            .any(|link| link.consumer() == end_point(1) && step_of(link.producer()) == 2));

        let expansion = successors.expand(&mut tree, ping, false, &mut statistics);
        assert!(expansion.solution.is_some());
    }

    #[test]
    fn forced_end_condition_rejects_successor() {
        let task = Rc::new(end_condition_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, true, false);
        let mut statistics = SearchStatistics::new();
        let (mut tree, root) = successors.initial_plan();
        let expansion = successors.expand(&mut tree, root, false, &mut statistics);
        let actions: Vec<ActionRef> = expansion
            .children
            .iter()
            .map(|&id| tree.get(id).action)
            .collect();
        assert_eq!(actions, vec![ActionRef::Task(1)]);
    }

    #[test]
    fn repeated_states_are_filtered() {
        let task = Rc::new(chain_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, true);
        let mut statistics = SearchStatistics::new();
        let (mut tree, root) = successors.initial_plan();
        assert_eq!(
            successors
                .expand(&mut tree, root, false, &mut statistics)
                .children
                .len(),
            1
        );
        let (mut other_tree, other_root) = successors.initial_plan();
        let expansion = successors.expand(&mut other_tree, other_root, false, &mut statistics);
        assert!(expansion.children.is_empty());
        assert!(other_tree.get(other_root).expanded());
    }

    #[test]
    fn time_initial_literals_prefix_the_plan() {
        let task = Rc::new(til_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, false);
        assert_eq!(successors.num_tils(), 1);
        let (tree, last) = successors.initial_plan();
        assert_eq!(tree.path(last), vec![0, 1]);
        let til = tree.get(last);
        assert_eq!(til.action, ActionRef::Fictitious(1));
        assert_eq!(til.fixed_end, Some(5.));
        assert_eq!(til.state.values[1], 1);
    }

    #[test]
    fn waits_for_time_initial_literal() {
        let task = Rc::new(til_task());
        let mut successors = Successors::new(task, HeuristicName::Ff, false, false);
        let mut statistics = SearchStatistics::new();
        let (mut tree, last) = successors.initial_plan();
        let expansion = successors.expand(&mut tree, last, false, &mut statistics);
        let child = tree.get(expansion.children[0]);
        assert_eq!(child.action, ActionRef::Task(0));
        assert_approx_eq!(child.start, 5.);
    }
}
