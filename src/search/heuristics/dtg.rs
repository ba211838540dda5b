//! Domain transition graphs. Each variable gets a graph over its values whose
//! edges are the actions that change it, annotated with the conditions on the
//! variables it causally depends on. The cost of reaching a value from the
//! value held in a reference state is found with Dijkstra, where the weight of
//! an edge recursively asks the other graphs for the cost of its conditions.

use crate::search::heuristics::{CausalGraph, Heuristic, HeuristicValue};
use crate::search::{Action, Fact, State, Task, ValueId, VarId, UNDEFINED_VALUE};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::rc::Rc;

/// A single action able to perform a value transition, with the conditions
/// it needs on other, causally relevant, variables.
#[derive(Debug, Clone)]
struct Transition {
    action: usize,
    conditions: Vec<Fact>,
}

impl Transition {
    fn new(var: VarId, action_index: usize, action: &Action, causal_graph: &CausalGraph) -> Self {
        let mut conditions: Vec<Fact> = vec![];
        for cond in action.all_conditions() {
            if cond.var != var
                && causal_graph.check_dependence(var, cond.var)
                && !conditions.iter().any(|c| c.var == cond.var)
            {
                conditions.push(*cond);
            }
        }
        Self {
            action: action_index,
            conditions,
        }
    }
}

/// All the actions that move the variable from one value to another.
#[derive(Debug, Clone)]
struct TransitionSet {
    to_value: usize,
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone)]
pub struct Dtg {
    var: VarId,
    /// `transitions[from]`, one set per reachable target value. The extra
    /// last node stands for the variable being undefined.
    transitions: Vec<Vec<TransitionSet>>,
}

impl Dtg {
    pub fn new(task: &Task, var: VarId, causal_graph: &CausalGraph) -> Self {
        let num_values = task.variables[var as usize].num_values();
        let mut dtg = Self {
            var,
            transitions: vec![vec![]; num_values + 1],
        };
        for to_value in 0..num_values {
            for &index in &task.producers[var as usize][to_value] {
                let action = &task.actions[index];
                match dtg.from_value(action) {
                    Some(from_value) => {
                        dtg.add_transition(from_value as usize, to_value, index, action, causal_graph)
                    }
                    None => {
                        for from_value in 0..=num_values {
                            if !dtg.is_mutex(task, from_value, action) {
                                dtg.add_transition(from_value, to_value, index, action, causal_graph);
                            }
                        }
                    }
                }
            }
        }
        dtg
    }

    fn undefined_node(&self) -> usize {
        self.transitions.len() - 1
    }

    /// The value of this variable required by the action, if any.
    fn from_value(&self, action: &Action) -> Option<ValueId> {
        action
            .all_conditions()
            .find(|cond| cond.var == self.var)
            .map(|cond| cond.value)
    }

    fn is_mutex(&self, task: &Task, from_value: usize, action: &Action) -> bool {
        if from_value == self.undefined_node() {
            return false;
        }
        action
            .all_conditions()
            .any(|cond| task.is_mutex(self.var, from_value as ValueId, cond.var, cond.value))
    }

    fn add_transition(
        &mut self,
        from_value: usize,
        to_value: usize,
        index: usize,
        action: &Action,
        causal_graph: &CausalGraph,
    ) {
        if from_value == to_value {
            return;
        }
        let sets = &mut self.transitions[from_value];
        let position = match sets.iter().position(|set| set.to_value == to_value) {
            Some(position) => position,
            None => {
                sets.push(TransitionSet {
                    to_value,
                    transitions: vec![],
                });
                sets.len() - 1
            }
        };
        let set = &mut sets[position];
        if set.transitions.iter().all(|t| t.action != index) {
            set.transitions
                .push(Transition::new(self.var, index, action, causal_graph));
        }
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.iter().map(Vec::len).sum()
    }
}

/// All the domain transition graphs of a task, with the per-state distance
/// caches.
#[derive(Debug)]
pub struct DtgSet {
    task: Rc<Task>,
    dtgs: Rc<Vec<Dtg>>,
    /// Distances from the reference state's value of each variable, computed
    /// lazily and discarded whenever the reference state changes.
    cache: Vec<Option<Vec<f32>>>,
}

impl DtgSet {
    pub fn new(task: Rc<Task>) -> Self {
        let causal_graph = CausalGraph::new(&task);
        let dtgs = (0..task.num_variables())
            .map(|var| Dtg::new(&task, var as VarId, &causal_graph))
            .collect::<Vec<_>>();
        let cache = vec![None; task.num_variables()];
        Self {
            task,
            dtgs: Rc::new(dtgs),
            cache,
        }
    }

    pub fn dtg(&self, var: VarId) -> &Dtg {
        &self.dtgs[var as usize]
    }

    /// Sets a new reference state, invalidating every cached distance.
    pub fn clear_cache(&mut self) {
        self.cache.iter_mut().for_each(|c| *c = None);
    }

    /// Least cost of reaching `var = value` from the value `var` holds in the
    /// reference state, infinite if no transition path exists.
    pub fn evaluate_condition_cost_without_context(
        &mut self,
        state: &State,
        var: VarId,
        value: ValueId,
    ) -> f32 {
        self.condition_cost(state, var, value, 0)
    }

    fn condition_cost(&mut self, state: &State, var: VarId, value: ValueId, depth: usize) -> f32 {
        // The causal graph is acyclic, so recursion deeper than the number of
        // variables means something is broken.
        if depth > self.dtgs.len() {
            return f32::INFINITY;
        }
        if self.cache[var as usize].is_none() {
            let distances = self.dijkstra(state, var, depth);
            self.cache[var as usize] = Some(distances);
        }
        self.cache[var as usize]
            .as_ref()
            .map_or(f32::INFINITY, |distances| distances[value as usize])
    }

    fn dijkstra(&mut self, state: &State, var: VarId, depth: usize) -> Vec<f32> {
        let dtgs = self.dtgs.clone();
        let dtg = &dtgs[var as usize];
        let undefined = dtg.undefined_node();
        let origin = match state.value(var) {
            UNDEFINED_VALUE => undefined,
            value => value as usize,
        };
        let transitions = &dtg.transitions;

        let mut distance = vec![f32::INFINITY; transitions.len()];
        let mut visited = vec![false; transitions.len()];
        let mut queue = PriorityQueue::new();
        distance[origin] = 0.;
        queue.push(origin, Reverse(OrderedFloat(0.)));
        while let Some((from, _)) = queue.pop() {
            if visited[from] {
                continue;
            }
            visited[from] = true;
            for set in &transitions[from] {
                let weight = self.transition_set_weight(state, set, depth);
                let candidate = distance[from] + weight;
                if candidate < distance[set.to_value] {
                    distance[set.to_value] = candidate;
                    queue.push_increase(set.to_value, Reverse(OrderedFloat(candidate)));
                }
            }
        }
        distance.truncate(undefined);
        distance
    }

    /// The cheapest action of the set, counting its own cost and the cost of
    /// its conditions on other variables.
    fn transition_set_weight(&mut self, state: &State, set: &TransitionSet, depth: usize) -> f32 {
        let mut best = f32::INFINITY;
        for transition in &set.transitions {
            let action = &self.task.actions[transition.action];
            let mut cost = self
                .task
                .compute_action_cost(action, &state.numeric, 0.);
            for cond in &transition.conditions {
                if cost >= best {
                    break;
                }
                cost += self.condition_cost(state, cond.var, cond.value, depth + 1);
            }
            if cost < best {
                best = cost;
            }
        }
        best
    }

    /// Cost of the cheapest goal description, each the sum of the distances
    /// of its conditions.
    pub fn evaluate_cost_without_context(&mut self, state: &State) -> f32 {
        self.clear_cache();
        let task = self.task.clone();
        task.goals
            .iter()
            .map(|goal| {
                goal.all_conditions()
                    .map(|cond| self.condition_cost(state, cond.var, cond.value, 0))
                    .sum::<f32>()
            })
            .fold(f32::INFINITY, f32::min)
    }
}

impl Heuristic for DtgSet {
    fn evaluate(&mut self, state: &State, _makespan: f32) -> HeuristicValue {
        OrderedFloat(self.evaluate_cost_without_context(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn chain_distances() {
        let task = Rc::new(chain_task());
        let mut dtgs = DtgSet::new(task.clone());
        let state = task.initial_state();
        dtgs.clear_cache();

        // Current values cost nothing
        assert_eq!(dtgs.evaluate_condition_cost_without_context(&state, 0, 1), 0.);
        assert_eq!(dtgs.evaluate_condition_cost_without_context(&state, 1, 0), 0.);
        // b=1 needs a1 (cost 2) whose condition a=1 already holds
        assert_eq!(dtgs.evaluate_condition_cost_without_context(&state, 1, 1), 2.);
        // c=1 needs a2 (cost 3) plus b=1
        assert_eq!(dtgs.evaluate_condition_cost_without_context(&state, 2, 1), 5.);
        // nothing makes a=0 again
        assert_eq!(
            dtgs.evaluate_condition_cost_without_context(&state, 0, 0),
            f32::INFINITY
        );
        assert_eq!(dtgs.evaluate_cost_without_context(&state), 5.);
    }

    #[test]
    fn costs_are_relative_to_reference_state() {
        let task = Rc::new(chain_task());
        let mut dtgs = DtgSet::new(task.clone());
        let mut state = task.initial_state();
        state.set(&Fact::new(1, 1));
        assert_eq!(dtgs.evaluate_cost_without_context(&state), 3.);
        state.set(&Fact::new(2, 1));
        assert_eq!(dtgs.evaluate_cost_without_context(&state), 0.);
        assert!(dtgs.dtg(1).num_transitions() > 0);
    }

    #[test]
    fn unreachable_goal_is_infinite() {
        let task = Rc::new(dead_end_task());
        let mut dtgs = DtgSet::new(task.clone());
        let mut state = task.initial_state();
        // Nothing leaves the pit
        state.set(&Fact::new(0, 2));
        assert_eq!(dtgs.evaluate_cost_without_context(&state), f32::INFINITY);
        let mut heuristic: Box<dyn Heuristic> = Box::new(dtgs);
        assert!(heuristic
            .evaluate(&task.initial_state(), 0.)
            .into_inner()
            .is_finite());
    }
}
