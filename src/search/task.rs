//! The grounded finite-domain task consumed by the search. Tasks are produced
//! by an external grounding and translation pipeline and loaded from a RON or
//! JSON description. Everything the search needs beyond the raw description
//! (producer and requirer indices, the mutex closure, the permanent-mutex
//! flag) is derived here once and never changes afterwards.

use crate::search::{PlannerError, State};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// Index of a finite-domain variable.
pub type VarId = u16;
/// Index of a value, local to its variable.
pub type ValueId = u16;
/// Index of a numeric variable.
pub type NumVarId = u16;
/// A `(variable, value)` pair packed as variable in the lower 16 bits and
/// value in the higher 16 bits.
pub type FactCode = u32;

/// Separation between an effect and the earliest condition that can rely on
/// it, also the duration of the fictitious initial action.
pub const EPSILON: f32 = 0.001;

/// Value of a variable that has not been assigned any value yet.
pub const UNDEFINED_VALUE: ValueId = ValueId::MAX;

#[inline]
pub fn fact_code(var: VarId, value: ValueId) -> FactCode {
    FactCode::from(var) | (FactCode::from(value) << 16)
}

#[inline]
pub fn fact_code_var(code: FactCode) -> VarId {
    (code & 0xFFFF) as VarId
}

#[inline]
pub fn fact_code_value(code: FactCode) -> ValueId {
    (code >> 16) as ValueId
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub var: VarId,
    pub value: ValueId,
}

impl Fact {
    pub fn new(var: VarId, value: ValueId) -> Self {
        Self { var, value }
    }

    pub fn code(&self) -> FactCode {
        fact_code(self.var, self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub values: Vec<String>,
    /// Values the variable takes regardless of the actions chosen, with the
    /// time at which they become true. Time 0 is the initial state, later
    /// times are time-initial literals.
    pub timed_values: Vec<(ValueId, f32)>,
}

impl Variable {
    pub fn initial_value(&self) -> Option<ValueId> {
        self.timed_values
            .iter()
            .find(|(_, time)| *time == 0.)
            .map(|(value, _)| *value)
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericVariable {
    pub name: String,
    /// `(value, time)` pairs, time 0 is the initial value.
    pub timed_values: Vec<(f32, f32)>,
}

impl NumericVariable {
    pub fn initial_value(&self) -> f32 {
        self.timed_values
            .iter()
            .find(|(_, time)| *time == 0.)
            .map(|(value, _)| *value)
            .unwrap_or(0.)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparator {
    Eq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericCondition {
    pub var: NumVarId,
    pub comparator: Comparator,
    pub value: f32,
}

impl NumericCondition {
    pub fn holds(&self, numeric_state: &[f32]) -> bool {
        let v = numeric_state[self.var as usize];
        match self.comparator {
            Comparator::Eq => (v - self.value).abs() < EPSILON,
            Comparator::Less => v < self.value,
            Comparator::LessEq => v <= self.value + EPSILON,
            Comparator::Greater => v > self.value,
            Comparator::GreaterEq => v + EPSILON >= self.value,
            Comparator::NotEq => (v - self.value).abs() >= EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericOp {
    Assign,
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericEffect {
    pub var: NumVarId,
    pub op: NumericOp,
    pub value: f32,
}

impl NumericEffect {
    pub fn apply(&self, numeric_state: &mut [f32]) {
        let v = &mut numeric_state[self.var as usize];
        match self.op {
            NumericOp::Assign => *v = self.value,
            NumericOp::Increase => *v += self.value,
            NumericOp::Decrease => *v -= self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionCost {
    Fixed(f32),
    /// `constant + sum(factor * var) + makespan_factor * makespan`
    Linear {
        constant: f32,
        #[serde(default)]
        terms: Vec<(NumVarId, f32)>,
        #[serde(default)]
        makespan_factor: f32,
    },
}

impl Default for ActionCost {
    fn default() -> Self {
        ActionCost::Fixed(1.)
    }
}

fn default_duration() -> f32 {
    1.
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default = "default_duration")]
    pub duration: f32,
    #[serde(default)]
    pub start_cond: Vec<Fact>,
    #[serde(default)]
    pub over_cond: Vec<Fact>,
    #[serde(default)]
    pub end_cond: Vec<Fact>,
    #[serde(default)]
    pub start_eff: Vec<Fact>,
    #[serde(default)]
    pub end_eff: Vec<Fact>,
    #[serde(default)]
    pub start_num_cond: Vec<NumericCondition>,
    #[serde(default)]
    pub start_num_eff: Vec<NumericEffect>,
    #[serde(default)]
    pub end_num_eff: Vec<NumericEffect>,
    #[serde(default)]
    pub cost: ActionCost,
    #[serde(default)]
    pub is_goal: bool,
    #[serde(default)]
    pub is_til: bool,
}

impl Action {
    /// Start, over-all and end conditions, in that order.
    pub fn all_conditions(&self) -> impl Iterator<Item = &Fact> {
        self.start_cond
            .iter()
            .chain(self.over_cond.iter())
            .chain(self.end_cond.iter())
    }

    pub fn all_effects(&self) -> impl Iterator<Item = &Fact> {
        self.start_eff.iter().chain(self.end_eff.iter())
    }
}

/// On-disk description of a grounded task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescription {
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub numeric_variables: Vec<NumericVariable>,
    pub actions: Vec<Action>,
    pub goals: Vec<Action>,
    /// Static mutex pairs between facts of different variables.
    #[serde(default)]
    pub mutexes: Vec<(Fact, Fact)>,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub variables: Vec<Variable>,
    pub numeric_variables: Vec<NumericVariable>,
    pub actions: Vec<Action>,
    /// One synthetic goal action per alternative goal description.
    pub goals: Vec<Action>,
    /// `producers[var][value]`: indices of the actions with an effect
    /// `var = value`.
    pub producers: Vec<Vec<Vec<usize>>>,
    /// `requirers[var][value]`: indices of the actions with a start or
    /// over-all condition `var = value`.
    pub requirers: Vec<Vec<Vec<usize>>>,
    mutex: HashSet<(FactCode, FactCode)>,
    permanent_mutex_action: bool,
}

impl Task {
    pub fn new(description: TaskDescription) -> Result<Self, PlannerError> {
        let TaskDescription {
            variables,
            numeric_variables,
            actions,
            goals,
            mutexes,
        } = description;

        let check_fact = |fact: &Fact, owner: &str| -> Result<(), PlannerError> {
            let var = variables.get(fact.var as usize).ok_or_else(|| {
                PlannerError::InvalidTask(format!("{owner} uses unknown variable {}", fact.var))
            })?;
            if fact.value as usize >= var.num_values() {
                return Err(PlannerError::InvalidTask(format!(
                    "{owner} uses unknown value {} of variable {}",
                    fact.value, var.name
                )));
            }
            Ok(())
        };
        let check_numeric = |var: NumVarId, owner: &str| -> Result<(), PlannerError> {
            if var as usize >= numeric_variables.len() {
                return Err(PlannerError::InvalidTask(format!(
                    "{owner} uses unknown numeric variable {var}"
                )));
            }
            Ok(())
        };
        for variable in &variables {
            if let Some(&(value, _)) = variable
                .timed_values
                .iter()
                .find(|(value, _)| *value as usize >= variable.num_values())
            {
                return Err(PlannerError::InvalidTask(format!(
                    "variable {} takes unknown value {value}",
                    variable.name
                )));
            }
        }
        for action in actions.iter().chain(goals.iter()) {
            for fact in action.all_conditions().chain(action.all_effects()) {
                check_fact(fact, &action.name)?;
            }
            let numeric_vars = action
                .start_num_cond
                .iter()
                .map(|c| c.var)
                .chain(action.start_num_eff.iter().map(|e| e.var))
                .chain(action.end_num_eff.iter().map(|e| e.var));
            for var in numeric_vars {
                check_numeric(var, &action.name)?;
            }
            if let ActionCost::Linear { terms, .. } = &action.cost {
                for &(var, _) in terms {
                    check_numeric(var, &action.name)?;
                }
            }
        }
        for (a, b) in &mutexes {
            check_fact(a, "mutex table")?;
            check_fact(b, "mutex table")?;
        }
        if goals.is_empty() {
            return Err(PlannerError::InvalidTask("the task has no goal".to_string()));
        }

        let mut producers: Vec<Vec<Vec<usize>>> = variables
            .iter()
            .map(|v| vec![vec![]; v.num_values()])
            .collect();
        let mut requirers = producers.clone();
        for (index, action) in actions.iter().enumerate() {
            for eff in action.all_effects() {
                let list = &mut producers[eff.var as usize][eff.value as usize];
                if !list.contains(&index) {
                    list.push(index);
                }
            }
            for cond in action.start_cond.iter().chain(action.over_cond.iter()) {
                let list = &mut requirers[cond.var as usize][cond.value as usize];
                if !list.contains(&index) {
                    list.push(index);
                }
            }
        }

        let mut mutex = HashSet::new();
        for (a, b) in &mutexes {
            mutex.insert((a.code(), b.code()));
            mutex.insert((b.code(), a.code()));
        }

        let mut task = Self {
            variables,
            numeric_variables,
            actions,
            goals,
            producers,
            requirers,
            mutex,
            permanent_mutex_action: false,
        };
        task.permanent_mutex_action = task.detect_permanent_mutex_action();
        Ok(task)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlannerError> {
        let text = std::fs::read_to_string(path).map_err(|e| PlannerError::io(path, e))?;
        let description: TaskDescription =
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("ron") => ron::from_str(&text).map_err(|source| PlannerError::RonTask {
                    path: path.to_path_buf(),
                    source,
                })?,
                Some("json") => {
                    serde_json::from_str(&text).map_err(|source| PlannerError::JsonTask {
                        path: path.to_path_buf(),
                        source,
                    })?
                }
                _ => return Err(PlannerError::UnknownTaskFormat(path.to_path_buf())),
            };
        Self::new(description)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn initial_state(&self) -> State {
        State::new(
            self.variables
                .iter()
                .map(|v| v.initial_value().unwrap_or(UNDEFINED_VALUE))
                .collect(),
            self.numeric_variables
                .iter()
                .map(|v| v.initial_value())
                .collect(),
        )
    }

    /// Static mutex check. Two different values of the same variable are
    /// always mutex.
    pub fn is_mutex(&self, var1: VarId, value1: ValueId, var2: VarId, value2: ValueId) -> bool {
        if var1 == var2 {
            return value1 != value2;
        }
        self.mutex
            .contains(&(fact_code(var1, value1), fact_code(var2, value2)))
    }

    pub fn has_permanent_mutex_action(&self) -> bool {
        self.permanent_mutex_action
    }

    pub fn compute_action_cost(&self, action: &Action, numeric_state: &[f32], makespan: f32) -> f32 {
        match &action.cost {
            ActionCost::Fixed(cost) => *cost,
            ActionCost::Linear {
                constant,
                terms,
                makespan_factor,
            } => {
                constant
                    + terms
                        .iter()
                        .map(|(var, factor)| factor * numeric_state[*var as usize])
                        .sum::<f32>()
                    + makespan_factor * makespan
            }
        }
    }

    pub fn fact_name(&self, fact: Fact) -> String {
        let var = &self.variables[fact.var as usize];
        format!("{}={}", var.name, var.values[fact.value as usize])
    }

    /// An effect `v = x` is irreversible when no action can move `v` away
    /// from `x`: every producer of another value of `v` requires a value of
    /// `v` different from `x`. Such an effect is a permanent mutex when some
    /// other value of `v` is still needed by an action or a goal.
    fn detect_permanent_mutex_action(&self) -> bool {
        self.actions.iter().any(|action| {
            action
                .all_effects()
                .any(|eff| self.is_irreversible(*eff) && self.other_value_required(*eff))
        })
    }

    fn is_irreversible(&self, fact: Fact) -> bool {
        let var = fact.var as usize;
        self.producers[var]
            .iter()
            .enumerate()
            .filter(|(value, _)| *value != fact.value as usize)
            .flat_map(|(_, producers)| producers.iter())
            .all(|&index| {
                self.actions[index]
                    .all_conditions()
                    .any(|c| c.var == fact.var && c.value != fact.value)
            })
    }

    fn other_value_required(&self, fact: Fact) -> bool {
        self.actions
            .iter()
            .chain(self.goals.iter())
            .flat_map(|a| a.all_conditions())
            .any(|c| c.var == fact.var && c.value != fact.value)
    }

    /// Human readable listing of the variables and actions.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        for (i, var) in self.variables.iter().enumerate() {
            let _ = writeln!(s, "var {i} {}: {}", var.name, var.values.join(" "));
        }
        for action in &self.actions {
            let _ = writeln!(s, "action {} [{}]", action.name, action.duration);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn derived_indices() {
        let task = chain_task();

        assert_eq!(task.num_variables(), 3);
        // a1 produces b=1, a2 produces c=1
        assert_eq!(task.producers[1][1], vec![0]);
        assert_eq!(task.producers[2][1], vec![1]);
        // a1 requires a=1, a2 requires b=1
        assert_eq!(task.requirers[0][1], vec![0]);
        assert_eq!(task.requirers[1][1], vec![1]);
        assert!(task.requirers[2][1].is_empty());
    }

    #[test]
    fn mutex_is_symmetric() {
        let task = chain_task();
        assert!(task.is_mutex(0, 0, 0, 1));
        assert!(!task.is_mutex(0, 1, 0, 1));
        assert!(task.is_mutex(0, 0, 1, 1));
        assert!(task.is_mutex(1, 1, 0, 0));
        assert!(!task.is_mutex(0, 1, 2, 1));
    }

    #[test]
    fn permanent_mutex_detection() {
        assert!(!chain_task().has_permanent_mutex_action());
        assert!(dead_end_task().has_permanent_mutex_action());
    }

    #[test]
    fn linear_cost() {
        let task = chain_task();
        let action = Action {
            cost: ActionCost::Linear {
                constant: 1.,
                terms: vec![(0, 2.)],
                makespan_factor: 0.5,
            },
            ..Default::default()
        };
        assert_eq!(task.compute_action_cost(&action, &[3.], 4.), 9.);
    }

    #[test]
    fn invalid_fact_is_rejected() {
        let mut description = chain_description();
        description.actions[0].start_cond.push(Fact::new(0, 7));
        assert!(matches!(
            Task::new(description),
            Err(PlannerError::InvalidTask(_))
        ));
    }

    #[test]
    fn invalid_numeric_variable_is_rejected() {
        let mut description = chain_description();
        description.actions[1].end_num_eff.push(NumericEffect {
            var: 0,
            op: NumericOp::Increase,
            value: 1.,
        });
        assert!(matches!(
            Task::new(description),
            Err(PlannerError::InvalidTask(_))
        ));

        let mut description = chain_description();
        description.actions[0].cost = ActionCost::Linear {
            constant: 0.,
            terms: vec![(3, 1.)],
            makespan_factor: 0.,
        };
        assert!(matches!(
            Task::new(description),
            Err(PlannerError::InvalidTask(_))
        ));
    }

    #[test]
    fn invalid_timed_value_is_rejected() {
        let mut description = chain_description();
        description.variables[2].timed_values.push((5, 3.));
        assert!(matches!(
            Task::new(description),
            Err(PlannerError::InvalidTask(_))
        ));
    }

    #[test]
    fn loads_ron_and_json() {
        let description = chain_description();
        let dir = tempfile::tempdir().unwrap();

        let ron_path = dir.path().join("task.ron");
        std::fs::write(&ron_path, ron::to_string(&description).unwrap()).unwrap();
        let task = Task::from_path(&ron_path).unwrap();
        assert_eq!(task.actions.len(), 2);

        let json_path = dir.path().join("task.json");
        std::fs::write(&json_path, serde_json::to_string(&description).unwrap()).unwrap();
        let task = Task::from_path(&json_path).unwrap();
        assert_eq!(task.goals.len(), 1);

        let bad_path = dir.path().join("task.pddl");
        std::fs::write(&bad_path, "").unwrap();
        assert!(matches!(
            Task::from_path(&bad_path),
            Err(PlannerError::UnknownTaskFormat(_))
        ));
    }
}
