//! Cost-based relaxed planning graph. Delete effects are ignored and every
//! fact is labelled with the cheapest accumulated cost at which it can first
//! be produced, starting from a given state.

use crate::search::{
    fact_code, fact_code_value, fact_code_var, Action, Fact, FactCode, State, Task, ValueId, VarId,
    EPSILON,
};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// How the relaxed problem treats end conditions and time-initial literals.
#[derive(Debug, Clone, Default)]
pub struct Relaxation {
    /// End conditions must already hold when an action starts.
    pub force_end_conditions: bool,
    /// Time-initial literal actions with the time their effects hold.
    pub tils: Vec<(Action, f32)>,
}

#[derive(Debug, Clone)]
pub struct CostRpg {
    fact_levels: HashMap<FactCode, f32>,
    action_levels: Vec<Option<f32>>,
    action_costs: Vec<f32>,
}

impl CostRpg {
    pub fn build(task: &Task, state: &State, makespan: f32) -> Self {
        Self::propagate(task, &state_facts(state), &state.numeric, makespan, false)
    }

    /// Like [`CostRpg::build`] under `relaxation`. The effects of the
    /// time-initial literals still to come after `makespan` are reached from
    /// the start, even when a later literal overwrites them in `state`.
    pub fn build_relaxed(
        task: &Task,
        state: &State,
        makespan: f32,
        relaxation: &Relaxation,
    ) -> Self {
        let mut facts = state_facts(state);
        facts.extend(
            relaxation
                .tils
                .iter()
                .filter(|(_, time)| *time > makespan)
                .flat_map(|(action, _)| action.end_eff.iter().copied()),
        );
        Self::propagate(
            task,
            &facts,
            &state.numeric,
            makespan,
            relaxation.force_end_conditions,
        )
    }

    /// Like [`CostRpg::build`], but end conditions must also hold before an
    /// action can be applied. Several values of a variable may be reached
    /// from the start.
    pub fn build_forcing_end_conditions(
        task: &Task,
        facts: &[Fact],
        numeric: &[f32],
        makespan: f32,
    ) -> Self {
        Self::propagate(task, facts, numeric, makespan, true)
    }

    fn propagate(
        task: &Task,
        facts: &[Fact],
        numeric: &[f32],
        makespan: f32,
        force_end: bool,
    ) -> Self {
        let action_costs = task
            .actions
            .iter()
            .map(|a| task.compute_action_cost(a, numeric, makespan))
            .collect();
        let mut rpg = Self {
            fact_levels: HashMap::new(),
            action_levels: vec![None; task.actions.len()],
            action_costs,
        };

        let mut end_requirers: HashMap<FactCode, Vec<usize>> = HashMap::new();
        if force_end {
            for (index, action) in task.actions.iter().enumerate() {
                for cond in &action.end_cond {
                    end_requirers.entry(cond.code()).or_default().push(index);
                }
            }
        }
        let conditions = |action: &'_ Action| -> Vec<Fact> {
            let mut conds: Vec<Fact> = action
                .start_cond
                .iter()
                .chain(action.over_cond.iter())
                .copied()
                .collect();
            if force_end {
                conds.extend(action.end_cond.iter().copied());
            }
            conds
        };

        let mut queue = PriorityQueue::new();
        let seeds: HashSet<FactCode> = facts.iter().map(Fact::code).collect();
        for &code in &seeds {
            rpg.fact_levels.insert(code, 0.);
        }
        // Only the seed facts decide what is applicable at level zero.
        for (index, action) in task.actions.iter().enumerate() {
            if conditions(action)
                .iter()
                .all(|cond| seeds.contains(&cond.code()))
            {
                rpg.apply(index, action, 0., &mut queue);
            }
        }

        while let Some((code, Reverse(OrderedFloat(level)))) = queue.pop() {
            let var = fact_code_var(code) as usize;
            let value = fact_code_value(code) as usize;
            let candidates = task.requirers[var][value]
                .iter()
                .chain(end_requirers.get(&code).into_iter().flatten());
            for &index in candidates {
                if rpg.action_levels[index].is_some() {
                    continue;
                }
                let action = &task.actions[index];
                let mut action_level = 0.;
                let mut applicable = true;
                for cond in conditions(action) {
                    match rpg.fact_levels.get(&cond.code()) {
                        Some(&cond_level) if cond_level <= level => action_level += cond_level,
                        _ => {
                            applicable = false;
                            break;
                        }
                    }
                }
                if applicable {
                    rpg.apply(index, action, action_level, &mut queue);
                }
            }
        }
        rpg
    }

    /// Records the action once its conditions are reached at
    /// `condition_level` and propagates its effects, start effects `EPSILON`
    /// later and end effects after its cost.
    fn apply(
        &mut self,
        index: usize,
        action: &Action,
        condition_level: f32,
        queue: &mut PriorityQueue<FactCode, Reverse<OrderedFloat<f32>>>,
    ) {
        self.action_levels[index] = Some(condition_level.max(EPSILON));
        let start_level = condition_level + EPSILON;
        let end_level = start_level + self.action_costs[index];
        for (effects, eff_level) in [(&action.start_eff, start_level), (&action.end_eff, end_level)] {
            for eff in effects {
                let code = eff.code();
                let improves = self
                    .fact_levels
                    .get(&code)
                    .map_or(true, |&current| current > eff_level);
                if improves {
                    self.fact_levels.insert(code, eff_level);
                    queue.push_increase(code, Reverse(OrderedFloat(eff_level)));
                }
            }
        }
    }

    /// Cost level at which `var = value` is first reached.
    pub fn fact_level(&self, var: VarId, value: ValueId) -> Option<f32> {
        self.fact_levels.get(&fact_code(var, value)).copied()
    }

    /// Whether the fact was reached from the start, at level zero.
    pub fn is_seed(&self, fact: &Fact) -> bool {
        self.fact_levels.get(&fact.code()) == Some(&0.)
    }

    pub fn fact_reached(&self, fact: &Fact) -> bool {
        self.fact_levels.contains_key(&fact.code())
    }

    pub fn action_level(&self, index: usize) -> Option<f32> {
        self.action_levels[index]
    }

    pub fn action_cost(&self, index: usize) -> f32 {
        self.action_costs[index]
    }

    /// Sum of the levels of the facts, `None` if any of them is unreached.
    pub fn cost_of<'a>(&self, facts: impl IntoIterator<Item = &'a Fact>) -> Option<f32> {
        facts
            .into_iter()
            .map(|fact| self.fact_levels.get(&fact.code()).copied())
            .sum()
    }
}

fn state_facts(state: &State) -> Vec<Fact> {
    state
        .values
        .iter()
        .enumerate()
        .filter(|(var, _)| state.is_defined(*var as VarId))
        .map(|(var, &value)| Fact::new(var as VarId, value))
        .collect()
}
