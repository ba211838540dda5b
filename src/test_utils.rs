use crate::search::planner::{fictitious_actions, ActionRef, Plan, PlanId, PlanTree};
use crate::search::{Action, ActionCost, Fact, State, Task, TaskDescription, Variable};
use ordered_float::OrderedFloat;

fn binary_variable(name: &str, initial: u16) -> Variable {
    Variable {
        name: name.to_string(),
        values: vec!["f".to_string(), "t".to_string()],
        timed_values: vec![(initial, 0.)],
    }
}

fn goal(conditions: Vec<Fact>) -> Action {
    Action {
        name: "goal".to_string(),
        duration: 0.,
        start_cond: conditions,
        cost: ActionCost::Fixed(0.),
        is_goal: true,
        ..Default::default()
    }
}

/// Three binary variables a, b and c, with a initially true. a1 turns b on
/// when a holds, a2 turns c on when b holds; the goal is c.
pub fn chain_description() -> TaskDescription {
    TaskDescription {
        variables: vec![
            binary_variable("a", 1),
            binary_variable("b", 0),
            binary_variable("c", 0),
        ],
        numeric_variables: vec![],
        actions: vec![
            Action {
                name: "a1".to_string(),
                duration: 2.,
                start_cond: vec![Fact::new(0, 1)],
                end_eff: vec![Fact::new(1, 1)],
                cost: ActionCost::Fixed(2.),
                ..Default::default()
            },
            Action {
                name: "a2".to_string(),
                duration: 1.,
                start_cond: vec![Fact::new(1, 1)],
                end_eff: vec![Fact::new(2, 1)],
                cost: ActionCost::Fixed(3.),
                ..Default::default()
            },
        ],
        goals: vec![goal(vec![Fact::new(2, 1)])],
        mutexes: vec![(Fact::new(0, 0), Fact::new(1, 1))],
    }
}

pub fn chain_task() -> Task {
    Task::new(chain_description()).unwrap()
}

/// Falling into the pit cannot be undone and leaves the door out of reach.
pub fn dead_end_task() -> Task {
    let unit = |name: &str, start_cond: Fact, end_eff: Fact| Action {
        name: name.to_string(),
        duration: 1.,
        start_cond: vec![start_cond],
        end_eff: vec![end_eff],
        cost: ActionCost::Fixed(1.),
        ..Default::default()
    };
    Task::new(TaskDescription {
        variables: vec![
            Variable {
                name: "pos".to_string(),
                values: vec!["home".to_string(), "door".to_string(), "pit".to_string()],
                timed_values: vec![(0, 0.)],
            },
            Variable {
                name: "open".to_string(),
                values: vec!["no".to_string(), "yes".to_string()],
                timed_values: vec![(0, 0.)],
            },
        ],
        numeric_variables: vec![],
        actions: vec![
            unit("walk", Fact::new(0, 0), Fact::new(0, 1)),
            unit("fall", Fact::new(0, 0), Fact::new(0, 2)),
            unit("open", Fact::new(0, 1), Fact::new(1, 1)),
        ],
        goals: vec![goal(vec![Fact::new(1, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// wait needs at its end the fact ping produces.
pub fn end_condition_task() -> Task {
    Task::new(TaskDescription {
        variables: vec![binary_variable("v0", 0), binary_variable("v1", 0)],
        numeric_variables: vec![],
        actions: vec![
            Action {
                name: "wait".to_string(),
                duration: 5.,
                end_cond: vec![Fact::new(1, 1)],
                end_eff: vec![Fact::new(0, 1)],
                cost: ActionCost::Fixed(1.),
                ..Default::default()
            },
            Action {
                name: "ping".to_string(),
                duration: 1.,
                end_eff: vec![Fact::new(1, 1)],
                cost: ActionCost::Fixed(1.),
                ..Default::default()
            },
        ],
        goals: vec![goal(vec![Fact::new(0, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// v0 and v1 depend on each other, through a condition one way and through
/// a shared effect both ways.
pub fn cyclic_task() -> Task {
    Task::new(TaskDescription {
        variables: vec![binary_variable("v0", 0), binary_variable("v1", 0)],
        numeric_variables: vec![],
        actions: vec![
            Action {
                name: "x".to_string(),
                duration: 1.,
                start_cond: vec![Fact::new(1, 0)],
                end_eff: vec![Fact::new(0, 1)],
                ..Default::default()
            },
            Action {
                name: "y".to_string(),
                duration: 1.,
                end_eff: vec![Fact::new(1, 1), Fact::new(0, 0)],
                ..Default::default()
            },
        ],
        goals: vec![goal(vec![Fact::new(0, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// The light only comes on at time 5, and go needs it.
pub fn til_task() -> Task {
    Task::new(TaskDescription {
        variables: vec![
            binary_variable("x", 0),
            Variable {
                name: "light".to_string(),
                values: vec!["off".to_string(), "on".to_string()],
                timed_values: vec![(0, 0.), (1, 5.)],
            },
        ],
        numeric_variables: vec![],
        actions: vec![Action {
            name: "go".to_string(),
            duration: 1.,
            start_cond: vec![Fact::new(1, 1)],
            end_eff: vec![Fact::new(0, 1)],
            cost: ActionCost::Fixed(1.),
            ..Default::default()
        }],
        goals: vec![goal(vec![Fact::new(0, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// The light is only on between times 5 and 10, and go needs it.
pub fn til_window_task() -> Task {
    Task::new(TaskDescription {
        variables: vec![
            binary_variable("x", 0),
            Variable {
                name: "light".to_string(),
                values: vec!["off".to_string(), "on".to_string()],
                timed_values: vec![(0, 0.), (1, 5.), (0, 10.)],
            },
        ],
        numeric_variables: vec![],
        actions: vec![Action {
            name: "go".to_string(),
            duration: 1.,
            start_cond: vec![Fact::new(1, 1)],
            end_eff: vec![Fact::new(0, 1)],
            cost: ActionCost::Fixed(1.),
            ..Default::default()
        }],
        goals: vec![goal(vec![Fact::new(0, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// hold takes the lock for its whole duration; use only runs while the lock
/// is taken.
pub fn concurrent_task() -> Task {
    Task::new(TaskDescription {
        variables: vec![
            Variable {
                name: "lock".to_string(),
                values: vec!["free".to_string(), "busy".to_string()],
                timed_values: vec![(0, 0.)],
            },
            binary_variable("done", 0),
        ],
        numeric_variables: vec![],
        actions: vec![
            Action {
                name: "hold".to_string(),
                duration: 2.,
                start_eff: vec![Fact::new(0, 1)],
                end_eff: vec![Fact::new(0, 0)],
                cost: ActionCost::Fixed(1.),
                ..Default::default()
            },
            Action {
                name: "use".to_string(),
                duration: 1.,
                start_cond: vec![Fact::new(0, 1)],
                over_cond: vec![Fact::new(0, 1)],
                end_eff: vec![Fact::new(1, 1)],
                cost: ActionCost::Fixed(1.),
                ..Default::default()
            },
        ],
        goals: vec![goal(vec![Fact::new(1, 1)])],
        mutexes: vec![],
    })
    .unwrap()
}

/// The action setting the initial state of `task`.
pub fn initial_action(task: &Task) -> Action {
    fictitious_actions(task).remove(0).0
}

/// A root with one child per `(h, h_land, g)` triple. The returned ids
/// exclude the root.
pub fn scored_tree(scores: &[(f32, u32, u32)]) -> (PlanTree, Vec<PlanId>) {
    let mut tree = PlanTree::new(Plan::fictitious(0, 0., State::new(vec![], vec![])));
    let root = tree.root();
    let ids = scores
        .iter()
        .enumerate()
        .map(|(i, &(h, h_land, g))| {
            let mut plan = Plan::fictitious(0, 0., State::new(vec![], vec![]));
            plan.action = ActionRef::Task(i);
            plan.fixed_end = None;
            plan.h = OrderedFloat(h);
            plan.h_land = h_land;
            plan.g = g;
            plan.gc = g as f32;
            plan.makespan = g as f32;
            tree.add_child(root, plan)
        })
        .collect();
    (tree, ids)
}
