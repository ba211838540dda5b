//! The causal graph records which variables influence the transitions of
//! other variables. It is made acyclic after construction so that recursive
//! cost queries across variables always terminate.

use crate::search::{Action, Task, VarId};
use ndarray::Array2;
use petgraph::{algo::tarjan_scc, graph::DiGraph};
use std::collections::HashSet;
use tracing::debug;

/// Weight of a dependence on a variable used as a transition condition.
const CONDITION_WEIGHT: u32 = 2;
/// Weight of a dependence on a variable modified by the same action.
const CO_EFFECT_WEIGHT: u32 = 1;

#[derive(Debug, Clone)]
pub struct CausalGraph {
    /// `weights[[v, w]] > 0` iff `v` depends on `w`.
    weights: Array2<u32>,
}

impl CausalGraph {
    pub fn new(task: &Task) -> Self {
        let num_variables = task.num_variables();
        let mut weights = Array2::zeros((num_variables, num_variables));
        for action in &task.actions {
            Self::add_dependences(&mut weights, action);
        }
        let mut graph = Self { weights };
        graph.prune_cycles();
        graph
    }

    fn add_dependences(weights: &mut Array2<u32>, action: &Action) {
        let mut added: HashSet<(VarId, VarId)> = HashSet::new();
        let mut add = |v: VarId, w: VarId, weight: u32| {
            if v != w && added.insert((v, w)) {
                weights[[v as usize, w as usize]] += weight;
            }
        };
        for eff in &action.start_eff {
            for cond in &action.start_cond {
                add(eff.var, cond.var, CONDITION_WEIGHT);
            }
            for other in &action.start_eff {
                add(eff.var, other.var, CO_EFFECT_WEIGHT);
            }
        }
        for eff in &action.end_eff {
            for cond in action.all_conditions() {
                add(eff.var, cond.var, CONDITION_WEIGHT);
            }
            for other in action.all_effects() {
                add(eff.var, other.var, CO_EFFECT_WEIGHT);
            }
        }
    }

    /// Breaks every cycle: inside each strongly connected component the
    /// variable with the lowest incoming weight from the rest of the
    /// component loses all those incoming arcs, until one variable is left.
    fn prune_cycles(&mut self) {
        let n = self.weights.nrows();
        let mut graph = DiGraph::<(), ()>::with_capacity(n, 0);
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for ((v, w), &weight) in self.weights.indexed_iter() {
            if weight > 0 {
                graph.add_edge(nodes[v], nodes[w], ());
            }
        }

        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let mut members: Vec<usize> = component.iter().map(|node| node.index()).collect();
            members.sort_unstable();
            debug!(component = ?members, "pruning causal graph cycle");
            while members.len() > 1 {
                let (position, _) = members
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (i, members.iter().map(|&u| self.weights[[u, v]]).sum::<u32>()))
                    .min_by_key(|&(i, weight)| (weight, i))
                    .expect("component is not empty");
                let evicted = members.remove(position);
                for &u in &members {
                    self.weights[[u, evicted]] = 0;
                }
            }
        }
    }

    /// Whether `v1` depends on `v2`.
    #[inline]
    pub fn check_dependence(&self, v1: VarId, v2: VarId) -> bool {
        self.weights[[v1 as usize, v2 as usize]] > 0
    }

    pub fn num_variables(&self) -> usize {
        self.weights.nrows()
    }
}
