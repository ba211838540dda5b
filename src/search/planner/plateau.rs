//! Bounded local search started when the main frontier stops improving. It
//! explores from the stalled best plan, guided towards the goal facts that
//! plan still misses, until some plan beats the heuristic value the main
//! search is stuck at.

use crate::search::heuristics::HeuristicValue;
use crate::search::planner::{
    PlanId, PlanTree, PlateauSelector, QueueKind, QueueOrdering, SearchStatistics, Selector,
    Successors,
};
use crate::search::Fact;
use itertools::Itertools;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateauOutcome {
    /// A plan with a heuristic value below the one to improve.
    Improved(PlanId),
    Solution(PlanId),
    NoImprovement,
}

#[derive(Debug)]
pub struct Plateau {
    selector: PlateauSelector,
    h_to_improve: HeuristicValue,
}

impl Plateau {
    /// Starts a plateau search from `base`. The goal facts `base` misses
    /// become the priority goals of the evaluator until the plateau is
    /// cancelled.
    pub fn new(
        tree: &PlanTree,
        base: PlanId,
        h_to_improve: HeuristicValue,
        successors: &mut Successors,
    ) -> Self {
        let state = &tree.get(base).state;
        let priority_goals: Vec<Fact> = successors
            .task()
            .goals
            .iter()
            .flat_map(|goal| goal.all_conditions())
            .filter(|fact| !state.holds(fact))
            .copied()
            .unique()
            .collect();
        debug!(
            base = base,
            h_to_improve = h_to_improve.into_inner(),
            priority_goals = ?priority_goals
                .iter()
                .map(|fact| successors.task().fact_name(*fact))
                .collect::<Vec<_>>(),
            "starting plateau search"
        );
        successors.evaluator_mut().set_priority_goals(priority_goals);
        let mut selector = PlateauSelector::new(QueueKind::plateau(QueueOrdering::Hff));
        selector.add(base, tree);
        Self {
            selector,
            h_to_improve,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selector.is_empty()
    }

    /// Expands the best plan of the plateau. Close to the goal every action
    /// is tried, otherwise only the helpful ones.
    pub fn search_step(
        &mut self,
        tree: &mut PlanTree,
        successors: &mut Successors,
        near_goal: bool,
        statistics: &mut SearchStatistics,
    ) -> PlateauOutcome {
        if self.selector.is_empty() {
            return PlateauOutcome::NoImprovement;
        }
        let base = self.selector.poll(tree);
        let children = if tree.get(base).expanded() {
            let children: Vec<PlanId> = tree
                .children(base)
                .iter()
                .copied()
                .filter(|&id| !self.selector.contains(id) && !tree.get(id).action.is_goal())
                .collect();
            for &id in &children {
                let plan = tree.get(id);
                let h_aux = successors
                    .evaluator_mut()
                    .evaluate_priority_goals(&plan.state, plan.makespan);
                tree.get_mut(id).h_aux = h_aux;
            }
            children
        } else {
            let expansion = successors.expand(tree, base, !near_goal, statistics);
            if let Some(solution) = expansion.solution {
                return PlateauOutcome::Solution(solution);
            }
            expansion.children
        };

        let mut outcome = PlateauOutcome::NoImprovement;
        for id in children {
            if outcome == PlateauOutcome::NoImprovement && tree.get(id).h < self.h_to_improve {
                outcome = PlateauOutcome::Improved(id);
            }
            self.selector.add(id, tree);
        }
        outcome
    }

    /// Moves the open plans of the plateau to `selector` and drops the
    /// priority goals. Returns true if some exported plan improved the
    /// selector.
    pub fn cancel(
        self,
        selector: &mut Selector,
        tree: &PlanTree,
        successors: &mut Successors,
    ) -> bool {
        successors.evaluator_mut().clear_priority_goals();
        self.selector.export_to(selector, tree)
    }
}
