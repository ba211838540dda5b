use crate::search::heuristics::HeuristicValue;
use crate::search::planner::{Plan, PlanId, PlanTree};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::HashMap;
use strum_macros::{Display, EnumIter};

/// Primary key of a search queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum QueueOrdering {
    /// `h`
    Hff,
    /// `h_land`
    HLand,
    /// `g + h`
    GHff,
    /// `g + 2h`
    G2Hff,
    /// `g + 3h`
    G3Hff,
    /// `g + 3 h_land`
    G3HLand,
    /// `gc + h + h_land`
    GcHLandHff,
}

impl QueueOrdering {
    fn key(&self, plan: &Plan) -> HeuristicValue {
        let h = plan.h.into_inner();
        let h_land = plan.h_land as f32;
        let g = plan.g as f32;
        OrderedFloat(match self {
            QueueOrdering::Hff => h,
            QueueOrdering::HLand => h_land,
            QueueOrdering::GHff => g + h,
            QueueOrdering::G2Hff => g + 2. * h,
            QueueOrdering::G3Hff => g + 3. * h,
            QueueOrdering::G3HLand => g + 3. * h_land,
            QueueOrdering::GcHLandHff => plan.gc + h + h_land,
        })
    }

    fn uses_landmarks(&self) -> bool {
        matches!(self, QueueOrdering::HLand | QueueOrdering::G3HLand)
    }
}

/// An ordering, optionally tagged for plateau search. Plateau queues rank by
/// the priority goal heuristic first and break the remaining ties by
/// makespan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKind {
    pub ordering: QueueOrdering,
    pub plateau: bool,
}

impl QueueKind {
    pub fn new(ordering: QueueOrdering) -> Self {
        Self {
            ordering,
            plateau: false,
        }
    }

    pub fn plateau(ordering: QueueOrdering) -> Self {
        Self {
            ordering,
            plateau: true,
        }
    }

    /// The heuristic value this queue tries to improve.
    pub fn get_h(&self, plan: &Plan) -> HeuristicValue {
        if self.plateau {
            plan.h_aux
        } else if self.ordering.uses_landmarks() {
            OrderedFloat(plan.h_land as f32)
        } else {
            plan.h
        }
    }

    /// Total order over plans, `Less` means better.
    pub fn compare(&self, a: &Plan, b: &Plan) -> Ordering {
        let primary = if self.plateau {
            a.h_aux
                .cmp(&b.h_aux)
                .then_with(|| self.ordering.key(a).cmp(&self.ordering.key(b)))
        } else {
            self.ordering.key(a).cmp(&self.ordering.key(b))
        };
        let ties = primary
            .then_with(|| a.h.cmp(&b.h))
            .then_with(|| a.h_land.cmp(&b.h_land))
            .then_with(|| a.g.cmp(&b.g));
        let ties = if self.plateau {
            ties.then_with(|| OrderedFloat(a.makespan).cmp(&OrderedFloat(b.makespan)))
        } else {
            ties
        };
        ties.then_with(|| a.id.cmp(&b.id))
    }
}

/// Binary min-heap of plan ids with a position index, so any member can be
/// removed in logarithmic time.
#[derive(Debug)]
pub struct SearchQueue {
    kind: QueueKind,
    heap: Vec<PlanId>,
    positions: HashMap<PlanId, usize>,
    /// Best `get_h` value seen while this queue was the current one.
    pub best_h: HeuristicValue,
    /// Whether `best_h` improved since the last poll.
    pub improved_h: bool,
}

impl SearchQueue {
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            heap: vec![],
            positions: HashMap::new(),
            best_h: OrderedFloat(f32::INFINITY),
            improved_h: true,
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, id: PlanId) -> bool {
        self.positions.contains_key(&id)
    }

    /// The members in heap order.
    pub fn plans(&self) -> &[PlanId] {
        &self.heap
    }

    pub fn add(&mut self, id: PlanId, tree: &PlanTree) {
        if self.contains(id) {
            return;
        }
        self.heap.push(id);
        let position = self.heap.len() - 1;
        self.positions.insert(id, position);
        self.sift_up(position, tree);
    }

    /// Removes and returns the best plan. The queue must not be empty.
    pub fn poll(&mut self, tree: &PlanTree) -> PlanId {
        assert!(!self.heap.is_empty(), "polling an empty search queue");
        let best = self.heap[0];
        self.remove_at(0, tree);
        best
    }

    /// Removes a plan from anywhere in the queue. The plan must be a member.
    pub fn remove(&mut self, id: PlanId, tree: &PlanTree) {
        let position = *self
            .positions
            .get(&id)
            .expect("removing a plan not in the search queue");
        self.remove_at(position, tree);
    }

    fn remove_at(&mut self, position: usize, tree: &PlanTree) {
        let removed = self.heap.swap_remove(position);
        self.positions.remove(&removed);
        if position < self.heap.len() {
            self.positions.insert(self.heap[position], position);
            let moved = tree.get(self.heap[position]);
            if self.kind.compare(moved, tree.get(removed)) == Ordering::Less {
                self.sift_up(position, tree);
            } else {
                self.sift_down(position, tree);
            }
        }
    }

    fn less(&self, i: usize, j: usize, tree: &PlanTree) -> bool {
        self.kind.compare(tree.get(self.heap[i]), tree.get(self.heap[j])) == Ordering::Less
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.positions.insert(self.heap[i], i);
        self.positions.insert(self.heap[j], j);
    }

    fn sift_up(&mut self, mut position: usize, tree: &PlanTree) {
        while position > 0 {
            let parent = (position - 1) / 2;
            if !self.less(position, parent, tree) {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
    }

    fn sift_down(&mut self, mut position: usize, tree: &PlanTree) {
        loop {
            let left = 2 * position + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let child = if right < self.heap.len() && self.less(right, left, tree) {
                right
            } else {
                left
            };
            if !self.less(child, position, tree) {
                break;
            }
            self.swap(child, position);
            position = child;
        }
    }
}
