//! Fact landmarks found by backchaining from the goal through the conditions
//! shared by every relaxed achiever of a landmark.

use crate::search::heuristics::{CostRpg, Relaxation};
use crate::search::{Fact, State, Task};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

/// Landmarks accepted along a path, one bit per landmark.
pub type LandmarkSet = SmallVec<[u64; 2]>;

#[derive(Debug, Clone)]
struct LandmarkNode {
    fact: Fact,
    is_goal: bool,
    initially_true: bool,
    /// Landmarks that must be reached before this one.
    predecessors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct LandmarkGraph {
    nodes: Vec<LandmarkNode>,
}

impl LandmarkGraph {
    pub fn new(task: &Task, initial_state: &State, relaxation: &Relaxation) -> Self {
        let rpg = CostRpg::build_relaxed(task, initial_state, 0., relaxation);
        let mut graph = Self { nodes: vec![] };
        let mut index_of: HashMap<Fact, usize> = HashMap::new();

        // Facts shared by every goal description
        let mut goal_facts: Vec<Fact> = task.goals[0].all_conditions().copied().collect();
        for goal in &task.goals[1..] {
            goal_facts.retain(|fact| goal.all_conditions().any(|c| c == fact));
        }

        let mut open = vec![];
        for fact in goal_facts {
            if !index_of.contains_key(&fact) {
                let index = graph.add_node(fact, true, initial_state);
                index_of.insert(fact, index);
                open.push(index);
            }
        }

        while let Some(index) = open.pop() {
            let node = &graph.nodes[index];
            if node.initially_true {
                continue;
            }
            let fact = node.fact;
            let achievers: Vec<usize> = task.producers[fact.var as usize][fact.value as usize]
                .iter()
                .copied()
                .filter(|&a| rpg.action_level(a).is_some())
                .collect();
            let Some((first, rest)) = achievers.split_first() else {
                continue;
            };
            let first = &task.actions[*first];
            let mut shared: Vec<Fact> = first
                .start_cond
                .iter()
                .chain(first.over_cond.iter())
                .copied()
                .filter(|c| *c != fact)
                .collect();
            for &other in rest {
                let other = &task.actions[other];
                shared.retain(|c| {
                    other
                        .start_cond
                        .iter()
                        .chain(other.over_cond.iter())
                        .any(|o| o == c)
                });
            }
            for cond in shared {
                let cond_index = match index_of.get(&cond) {
                    Some(&i) => i,
                    None => {
                        let i = graph.add_node(cond, false, initial_state);
                        index_of.insert(cond, i);
                        open.push(i);
                        i
                    }
                };
                if !graph.nodes[index].predecessors.contains(&cond_index)
                    && !graph.precedes(index, cond_index)
                {
                    graph.nodes[index].predecessors.push(cond_index);
                }
            }
        }
        debug!(
            landmarks = graph.nodes.len(),
            informative = graph.informative(),
            "landmark graph built"
        );
        graph
    }

    fn add_node(&mut self, fact: Fact, is_goal: bool, initial_state: &State) -> usize {
        self.nodes.push(LandmarkNode {
            fact,
            is_goal,
            initially_true: initial_state.holds(&fact),
            predecessors: vec![],
        });
        self.nodes.len() - 1
    }

    /// Whether landmark `a` must be reached before landmark `b`.
    fn precedes(&self, a: usize, b: usize) -> bool {
        let mut stack = vec![b];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(n) = stack.pop() {
            for &p in &self.nodes[n].predecessors {
                if p == a {
                    return true;
                }
                if !seen[p] {
                    seen[p] = true;
                    stack.push(p);
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn fact(&self, index: usize) -> Fact {
        self.nodes[index].fact
    }

    /// Whether some landmark is neither a goal nor true from the start.
    pub fn informative(&self) -> bool {
        self.nodes.iter().any(|n| !n.is_goal && !n.initially_true)
    }

    /// Landmarks accepted after reaching `state`: the ones accepted before,
    /// plus the ones true in `state` whose predecessors are all accepted.
    pub fn update(&self, accepted: &LandmarkSet, state: &State) -> LandmarkSet {
        let mut result = accepted.clone();
        result.resize(self.nodes.len().div_ceil(64), 0);
        loop {
            let mut changed = false;
            for (index, node) in self.nodes.iter().enumerate() {
                if !is_set(&result, index)
                    && state.holds(&node.fact)
                    && node.predecessors.iter().all(|&p| is_set(&result, p))
                {
                    result[index / 64] |= 1 << (index % 64);
                    changed = true;
                }
            }
            if !changed {
                return result;
            }
        }
    }

    pub fn count_unaccepted(&self, accepted: &LandmarkSet) -> u32 {
        (0..self.nodes.len())
            .filter(|&index| !is_set(accepted, index))
            .count() as u32
    }
}

fn is_set(set: &LandmarkSet, index: usize) -> bool {
    set.get(index / 64)
        .is_some_and(|word| word & (1 << (index % 64)) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn chain_landmarks() {
        let task = chain_task();
        let initial = task.initial_state();
        let graph = LandmarkGraph::new(&task, &initial, &Relaxation::default());

        // c=1, b=1 and a=1
        assert_eq!(graph.len(), 3);
        assert!(graph.informative());

        let root = graph.update(&LandmarkSet::new(), &initial);
        assert_eq!(graph.count_unaccepted(&root), 2);

        let mut state = initial.clone();
        state.set(&Fact::new(1, 1));
        let after_a1 = graph.update(&root, &state);
        assert_eq!(graph.count_unaccepted(&after_a1), 1);

        state.set(&Fact::new(2, 1));
        let after_a2 = graph.update(&after_a1, &state);
        assert_eq!(graph.count_unaccepted(&after_a2), 0);
    }

    #[test]
    fn orderings_must_be_respected() {
        let task = chain_task();
        let initial = task.initial_state();
        let graph = LandmarkGraph::new(&task, &initial, &Relaxation::default());
        let root = graph.update(&LandmarkSet::new(), &initial);
        // c=1 without b=1 ever being accepted does not count
        let mut state = initial.clone();
        state.set(&Fact::new(2, 1));
        let skipped = graph.update(&root, &state);
        assert_eq!(graph.count_unaccepted(&skipped), 2);
    }
}
