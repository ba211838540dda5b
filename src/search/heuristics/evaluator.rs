use crate::search::heuristics::{
    FfHeuristic, Heuristic, HeuristicName, HeuristicValue, LandmarkGraph, LandmarkSet, Relaxation,
};
use crate::search::{Fact, State, Task};
use ordered_float::OrderedFloat;
use std::rc::Rc;

/// Heuristic scores of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub h: HeuristicValue,
    /// Relaxed plan length for the priority goals, zero when there are none.
    pub h_aux: HeuristicValue,
    /// Number of landmarks not yet accepted.
    pub h_land: u32,
    pub landmarks: LandmarkSet,
}

/// Combines the primary heuristic, the landmark counter and the priority goal
/// heuristic into the scores attached to each plan.
#[derive(Debug)]
pub struct Evaluator {
    primary: Box<dyn Heuristic>,
    ff: FfHeuristic,
    landmarks: LandmarkGraph,
    priority_goals: Vec<Fact>,
}

impl Evaluator {
    /// Every relaxed plan is computed under `relaxation`, so the scores see
    /// the forced end conditions and the time-initial literals still to come.
    pub fn new(
        task: Rc<Task>,
        initial_state: &State,
        heuristic: HeuristicName,
        relaxation: Relaxation,
    ) -> Self {
        let relaxation = Rc::new(relaxation);
        Self {
            primary: heuristic.create(task.clone(), relaxation.clone()),
            landmarks: LandmarkGraph::new(&task, initial_state, &relaxation),
            ff: FfHeuristic::with_relaxation(task, relaxation),
            priority_goals: vec![],
        }
    }

    pub fn evaluate(
        &mut self,
        state: &State,
        makespan: f32,
        parent_landmarks: &LandmarkSet,
    ) -> Evaluation {
        let landmarks = self.landmarks.update(parent_landmarks, state);
        let h_land = self.landmarks.count_unaccepted(&landmarks);
        let h = self.primary.evaluate(state, makespan);
        let h_aux = self.evaluate_priority_goals(state, makespan);
        Evaluation {
            h,
            h_aux,
            h_land,
            landmarks,
        }
    }

    /// Relaxed plan length for the priority goals only.
    pub fn evaluate_priority_goals(&mut self, state: &State, makespan: f32) -> HeuristicValue {
        if self.priority_goals.is_empty() {
            OrderedFloat(0.)
        } else {
            self.ff.evaluate_facts(state, makespan, &self.priority_goals)
        }
    }

    /// Actions of a relaxed plan from `state` that can start right away.
    pub fn helpful_actions(&mut self, state: &State, makespan: f32) -> Vec<usize> {
        self.ff.evaluate(state, makespan);
        self.ff.helpful_actions(state)
    }

    pub fn informative_landmarks(&self) -> bool {
        self.landmarks.informative()
    }

    pub fn set_priority_goals(&mut self, goals: Vec<Fact>) {
        self.priority_goals = goals;
    }

    pub fn clear_priority_goals(&mut self) {
        self.priority_goals.clear();
    }

    pub fn priority_goals(&self) -> &[Fact] {
        &self.priority_goals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn scores_for_chain() {
        let task = Rc::new(chain_task());
        let initial = task.initial_state();
        let mut evaluator =
            Evaluator::new(task.clone(), &initial, HeuristicName::Ff, Relaxation::default());
        assert!(evaluator.informative_landmarks());

        let evaluation = evaluator.evaluate(&initial, 0., &LandmarkSet::new());
        assert_eq!(evaluation.h, OrderedFloat(2.));
        assert_eq!(evaluation.h_aux, OrderedFloat(0.));
        assert_eq!(evaluation.h_land, 2);
        assert_eq!(evaluator.helpful_actions(&initial, 0.), vec![0]);

        evaluator.set_priority_goals(vec![Fact::new(1, 1)]);
        let evaluation = evaluator.evaluate(&initial, 0., &LandmarkSet::new());
        assert_eq!(evaluation.h_aux, OrderedFloat(1.));
        assert_eq!(evaluator.evaluate_priority_goals(&initial, 0.), OrderedFloat(1.));
        evaluator.clear_priority_goals();
        assert!(evaluator.priority_goals().is_empty());
    }

    #[test]
    fn scores_see_pending_time_initial_literals() {
        let task = Rc::new(til_window_task());
        let initial = task.initial_state();
        let relaxation = Relaxation {
            force_end_conditions: false,
            tils: crate::search::planner::fictitious_actions(&task)[1..].to_vec(),
        };
        let mut evaluator = Evaluator::new(task.clone(), &initial, HeuristicName::Ff, relaxation);
        evaluator.set_priority_goals(vec![Fact::new(0, 1)]);
        let evaluation = evaluator.evaluate(&initial, 0., &LandmarkSet::new());
        assert_eq!(evaluation.h, OrderedFloat(1.));
        assert_eq!(evaluation.h_aux, OrderedFloat(1.));
    }

    #[test]
    fn causal_graph_scorer() {
        let task = Rc::new(chain_task());
        let initial = task.initial_state();
        let mut evaluator = Evaluator::new(
            task.clone(),
            &initial,
            HeuristicName::CausalGraph,
            Relaxation::default(),
        );
        let evaluation = evaluator.evaluate(&initial, 0., &LandmarkSet::new());
        assert_eq!(evaluation.h, OrderedFloat(5.));
    }
}
