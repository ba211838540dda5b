use crate::search::heuristics::HeuristicValue;
use crate::search::planner::{PlanId, PlanTree, QueueKind, QueueOrdering, SearchQueue};
use crate::search::EPSILON;
use ordered_float::OrderedFloat;

/// A frontier seen through several orderings at once. Every plan is pushed
/// into all the queues; polling takes the best plan of the current queue and
/// removes it from the others.
#[derive(Debug)]
pub struct Selector {
    queues: Vec<SearchQueue>,
    current: usize,
    overall_best: HeuristicValue,
    iterations_without_improving: u32,
}

impl Selector {
    pub fn new(kinds: &[QueueKind]) -> Self {
        assert!(!kinds.is_empty(), "a selector needs at least one queue");
        Self {
            queues: kinds.iter().copied().map(SearchQueue::new).collect(),
            current: 0,
            overall_best: OrderedFloat(f32::INFINITY),
            iterations_without_improving: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queues[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues[0].is_empty()
    }

    pub fn contains(&self, id: PlanId) -> bool {
        self.queues[0].contains(id)
    }

    /// Adds a plan to every queue. Returns true if its `h` beats the best
    /// value seen so far, which also resets the stagnation counter.
    pub fn add(&mut self, id: PlanId, tree: &PlanTree) -> bool {
        let plan = tree.get(id);
        let queue = &mut self.queues[self.current];
        let h = queue.kind().get_h(plan);
        if h < queue.best_h {
            queue.best_h = h;
            queue.improved_h = true;
        }
        for queue in &mut self.queues {
            queue.add(id, tree);
        }
        if plan.h < self.overall_best {
            self.iterations_without_improving = 0;
            self.overall_best = plan.h;
            true
        } else {
            false
        }
    }

    /// Removes the best plan of the current queue, moving to the next queue
    /// first if the current one stopped improving. The selector must not be
    /// empty.
    pub fn poll(&mut self, tree: &PlanTree) -> PlanId {
        if !self.queues[self.current].improved_h {
            self.current = (self.current + 1) % self.queues.len();
        }
        let next = self.queues[self.current].poll(tree);
        for (index, queue) in self.queues.iter_mut().enumerate() {
            if index != self.current {
                queue.remove(next, tree);
            }
        }
        self.queues[self.current].improved_h = false;
        self.iterations_without_improving += 1;
        next
    }

    pub fn in_plateau(&self, plateau_start: u32) -> bool {
        self.iterations_without_improving >= plateau_start
    }

    pub fn best_h(&self) -> HeuristicValue {
        self.overall_best
    }

    /// Takes the `h` of `id` as the best value, as if it had just been
    /// added.
    pub fn set_best_plan(&mut self, id: PlanId, tree: &PlanTree) {
        self.iterations_without_improving = 0;
        self.overall_best = tree.get(id).h;
    }

    pub fn set_iterations_without_improving(&mut self, iterations: u32) {
        self.iterations_without_improving = iterations;
    }

}

/// Single queue used by plateau searches.
#[derive(Debug)]
pub struct PlateauSelector {
    queue: SearchQueue,
}

impl PlateauSelector {
    pub fn new(kind: QueueKind) -> Self {
        Self {
            queue: SearchQueue::new(kind),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, id: PlanId) -> bool {
        self.queue.contains(id)
    }

    pub fn add(&mut self, id: PlanId, tree: &PlanTree) {
        self.queue.add(id, tree);
    }

    pub fn poll(&mut self, tree: &PlanTree) -> PlanId {
        self.queue.poll(tree)
    }

    pub fn export_to(&self, other: &mut Selector, tree: &PlanTree) -> bool {
        let mut improved = false;
        for &id in self.queue.plans() {
            improved |= other.add(id, tree);
        }
        improved
    }
}

/// Frontier for anytime refinement: only keeps plans that can still lead to
/// a better solution than the best one found.
#[derive(Debug)]
pub struct QualitySelector {
    queue: SearchQueue,
    best_gc: f32,
    best_g: u32,
}

impl QualitySelector {
    pub fn new(best_gc: f32, best_g: u32) -> Self {
        Self {
            queue: SearchQueue::new(QueueKind::plateau(QueueOrdering::GcHLandHff)),
            best_gc,
            best_g,
        }
    }

    pub fn set_best_plan_quality(&mut self, best_gc: f32, best_g: u32) {
        self.best_gc = best_gc;
        self.best_g = best_g;
    }

    /// Strictly cheaper, or as cheap with fewer actions.
    pub fn improves(&self, gc: f32, g: u32) -> bool {
        let distance_to_best = self.best_gc - gc;
        distance_to_best > EPSILON || (distance_to_best >= 0. && g < self.best_g)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn add(&mut self, id: PlanId, tree: &PlanTree) {
        let plan = tree.get(id);
        if self.improves(plan.gc, plan.g) {
            self.queue.add(id, tree);
        }
    }

    /// Best plan that still improves the bound, dropping the ones that no
    /// longer do.
    pub fn poll(&mut self, tree: &PlanTree) -> Option<PlanId> {
        while !self.queue.is_empty() {
            let id = self.queue.poll(tree);
            let plan = tree.get(id);
            if self.improves(plan.gc, plan.g) {
                return Some(id);
            }
        }
        None
    }
}
