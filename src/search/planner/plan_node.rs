//! The search tree. Every node adds one timed action to the plan of its
//! parent; the plan of a node is the path from the root to it. Nodes live in
//! an append-only arena and refer to each other by id.

use crate::search::heuristics::{HeuristicValue, LandmarkSet};
use crate::search::{Action, Fact, State, Task};
use ordered_float::OrderedFloat;
use segvec::{Linear, SegVec};
use smallvec::SmallVec;

pub type PlanId = usize;
/// Step `i` of a plan has the time points `2i` (start) and `2i + 1` (end).
pub type TimePoint = u16;
/// A precedence between two time points, packed as first point in the lower
/// 16 bits and second point in the higher 16 bits.
pub type Ordering = u32;

#[inline]
pub fn ordering(first: TimePoint, second: TimePoint) -> Ordering {
    Ordering::from(first) | (Ordering::from(second) << 16)
}

#[inline]
pub fn first_point(ordering: Ordering) -> TimePoint {
    (ordering & 0xFFFF) as TimePoint
}

#[inline]
pub fn second_point(ordering: Ordering) -> TimePoint {
    (ordering >> 16) as TimePoint
}

#[inline]
pub fn start_point(step: usize) -> TimePoint {
    (step << 1) as TimePoint
}

#[inline]
pub fn end_point(step: usize) -> TimePoint {
    ((step << 1) | 1) as TimePoint
}

#[inline]
pub fn step_of(point: TimePoint) -> usize {
    (point >> 1) as usize
}

/// The action applied by a plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionRef {
    /// Index into the task actions.
    Task(usize),
    /// Index into the task goal descriptions.
    Goal(usize),
    /// Index into the initial state and time-initial literal actions.
    Fictitious(usize),
}

impl ActionRef {
    pub fn resolve<'a>(&self, task: &'a Task, fictitious: &'a [Action]) -> &'a Action {
        match *self {
            ActionRef::Task(index) => &task.actions[index],
            ActionRef::Goal(index) => &task.goals[index],
            ActionRef::Fictitious(index) => &fictitious[index],
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(self, ActionRef::Goal(_))
    }

    pub fn is_fictitious(&self) -> bool {
        matches!(self, ActionRef::Fictitious(_))
    }
}

/// `fact` produced at the first point of `ordering` supports a condition at
/// its second point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CausalLink {
    pub fact: Fact,
    pub ordering: Ordering,
}

impl CausalLink {
    pub fn new(fact: Fact, producer: TimePoint, consumer: TimePoint) -> Self {
        Self {
            fact,
            ordering: ordering(producer, consumer),
        }
    }

    pub fn producer(&self) -> TimePoint {
        first_point(self.ordering)
    }

    pub fn consumer(&self) -> TimePoint {
        second_point(self.ordering)
    }
}

/// An end condition of a step not supported yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenCond {
    pub step: usize,
    pub fact: Fact,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub parent: Option<PlanId>,
    /// `None` until the plan is expanded.
    pub children: Option<Vec<PlanId>>,
    pub action: ActionRef,
    /// Fixed time of the action end, only for fictitious actions.
    pub fixed_end: Option<f32>,
    pub start: f32,
    pub end: f32,
    /// Latest end among the real actions of the plan.
    pub makespan: f32,
    pub orderings: SmallVec<[Ordering; 4]>,
    pub causal_links: SmallVec<[CausalLink; 4]>,
    /// All the open conditions of the plan, `None` if every condition is
    /// supported.
    pub open_cond: Option<Vec<OpenCond>>,
    pub unsatisfied_numeric_conditions: bool,
    pub h: HeuristicValue,
    pub h_aux: HeuristicValue,
    pub h_land: u32,
    /// Number of real actions.
    pub g: u32,
    /// Accumulated cost.
    pub gc: f32,
    pub landmarks: LandmarkSet,
    /// State at the end of the plan.
    pub state: State,
}

impl Plan {
    /// A node for a fictitious action, placed at `time`.
    pub fn fictitious(action: usize, time: f32, state: State) -> Self {
        Self {
            id: 0,
            parent: None,
            children: None,
            action: ActionRef::Fictitious(action),
            fixed_end: Some(time),
            start: time,
            end: time,
            makespan: 0.,
            orderings: SmallVec::new(),
            causal_links: SmallVec::new(),
            open_cond: None,
            unsatisfied_numeric_conditions: false,
            h: OrderedFloat(f32::INFINITY),
            h_aux: OrderedFloat(0.),
            h_land: 0,
            g: 0,
            gc: 0.,
            landmarks: LandmarkSet::new(),
            state,
        }
    }

    #[inline]
    pub fn expanded(&self) -> bool {
        self.children.is_some()
    }

    #[inline]
    pub fn has_open_conditions(&self) -> bool {
        self.open_cond.is_some()
    }

    pub fn is_solution(&self) -> bool {
        self.action.is_goal() && !self.has_open_conditions() && !self.unsatisfied_numeric_conditions
    }
}

/// Append-only arena of plans. Ids are dense and never reused.
#[derive(Debug)]
pub struct PlanTree {
    nodes: SegVec<Plan, Linear>,
}

impl PlanTree {
    pub fn new(mut root: Plan) -> Self {
        let mut nodes = SegVec::new();
        root.id = 0;
        root.parent = None;
        nodes.push(root);
        Self { nodes }
    }

    pub fn root(&self) -> PlanId {
        0
    }

    /// Adds `plan` as the last child of `parent` and returns its id. The
    /// parent counts as expanded from then on.
    pub fn add_child(&mut self, parent: PlanId, mut plan: Plan) -> PlanId {
        let id = self.nodes.len();
        plan.id = id;
        plan.parent = Some(parent);
        self.nodes.push(plan);
        self.get_mut(parent)
            .children
            .get_or_insert_with(Vec::new)
            .push(id);
        id
    }

    /// Marks the plan as expanded even if it got no children.
    pub fn set_expanded(&mut self, id: PlanId) {
        self.get_mut(id).children.get_or_insert_with(Vec::new);
    }

    pub fn get(&self, id: PlanId) -> &Plan {
        self.nodes.get(id).expect("Invalid plan id")
    }

    pub fn get_mut(&mut self, id: PlanId) -> &mut Plan {
        self.nodes.get_mut(id).expect("Invalid plan id")
    }

    pub fn children(&self, id: PlanId) -> &[PlanId] {
        self.get(id).children.as_deref().unwrap_or(&[])
    }

    /// Ids from the root to `id`, both included.
    pub fn path(&self, id: PlanId) -> Vec<PlanId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current).parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Plans not expanded yet, excluding goal nodes.
    pub fn frontier(&self) -> Vec<PlanId> {
        (0..self.len())
            .filter(|&id| {
                let plan = self.get(id);
                !plan.expanded() && !plan.action.is_goal()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(action: usize) -> Plan {
        let mut plan = Plan::fictitious(0, 0., State::new(vec![], vec![]));
        plan.action = ActionRef::Task(action);
        plan.fixed_end = None;
        plan
    }

    #[test]
    fn orderings_pack_points() {
        let o = ordering(3, 8);
        assert_eq!(first_point(o), 3);
        assert_eq!(second_point(o), 8);
        assert_eq!(step_of(start_point(4)), 4);
        assert_eq!(step_of(end_point(4)), 4);
        let link = CausalLink::new(Fact::new(1, 2), 1, 4);
        assert_eq!((link.producer(), link.consumer()), (1, 4));
    }

    #[test]
    fn children_are_recorded_once() {
        let mut tree = PlanTree::new(Plan::fictitious(0, 0., State::new(vec![], vec![])));
        let root = tree.root();
        assert!(!tree.get(root).expanded());
        let a = tree.add_child(root, leaf(0));
        let b = tree.add_child(root, leaf(1));
        let c = tree.add_child(a, leaf(1));

        assert!(tree.get(root).expanded());
        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.path(c), vec![root, a, c]);
        assert_eq!(tree.frontier(), vec![b, c]);
        for id in 1..tree.len() {
            let parent = tree.get(id).parent.unwrap();
            assert_eq!(tree.children(parent).iter().filter(|&&c| c == id).count(), 1);
        }

        tree.set_expanded(b);
        assert!(tree.get(b).expanded());
        assert!(tree.children(b).is_empty());
    }
}
