//! The search driver shared by every strategy. A strategy only decides how
//! the frontier is organised: one selector with optional plateau escape, or
//! two alternating selectors for domains with dead ends.

use crate::search::heuristics::HeuristicValue;
use crate::search::plan::{TimedPlan, TimedStep};
use crate::search::planner::{
    Plan, PlanId, PlanTree, Plateau, PlateauOutcome, QualitySelector, QueueKind, QueueOrdering,
    SearchStatistics, Selector, Successors, TerminationCondition,
};
use crate::search::{PlannerConfig, PlannerError};
use ordered_float::OrderedFloat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Heuristic distance to the goal under which plateau searches try every
/// action instead of the helpful ones.
const NEAR_GOAL_H: f32 = 6.;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    /// Actions may genuinely overlap, so states are not comparable.
    Concurrent,
    /// Some actions lead to states the goal cannot be reached from.
    DeadEnds,
    /// States can be compared and no action is irreversible.
    Reversible,
}

impl Strategy {
    /// Default plateau start and limit thresholds.
    pub fn plateau_thresholds(&self) -> (u32, u32) {
        match self {
            Strategy::Concurrent | Strategy::Reversible => (100, 500),
            Strategy::DeadEnds => (200, 400),
        }
    }
}

#[derive(Debug)]
enum Frontier {
    Single(Selector),
    /// Two selectors with complementary orderings, expanding in turns.
    Alternating {
        selectors: [Selector; 2],
        current: usize,
    },
}

impl Frontier {
    fn is_empty(&self) -> bool {
        match self {
            Frontier::Single(selector) => selector.is_empty(),
            Frontier::Alternating { selectors, .. } => selectors.iter().all(Selector::is_empty),
        }
    }

    fn add_initial(&mut self, id: PlanId, tree: &PlanTree) {
        match self {
            Frontier::Single(selector) => {
                selector.add(id, tree);
            }
            Frontier::Alternating { selectors, .. } => {
                for selector in selectors {
                    selector.add(id, tree);
                }
            }
        }
    }

    /// Adds a plan to the current selector. Plans that improve the first
    /// selector beyond the best value of the second also go to the second.
    /// Returns true if the current selector improved.
    fn add(&mut self, id: PlanId, tree: &PlanTree) -> bool {
        match self {
            Frontier::Single(selector) => selector.add(id, tree),
            Frontier::Alternating { selectors, current } => {
                let [first, second] = selectors;
                let (active, other) = if *current == 0 {
                    (first, second)
                } else {
                    (second, first)
                };
                let improved = active.add(id, tree);
                if improved && *current == 0 && active.best_h() < other.best_h() {
                    other.add(id, tree);
                }
                improved
            }
        }
    }

    fn poll(&mut self, tree: &PlanTree) -> PlanId {
        match self {
            Frontier::Single(selector) => selector.poll(tree),
            Frontier::Alternating { selectors, current } => {
                if selectors[*current].is_empty() {
                    *current = 1 - *current;
                }
                selectors[*current].poll(tree)
            }
        }
    }

    fn switch(&mut self) {
        if let Frontier::Alternating { current, .. } = self {
            *current = 1 - *current;
        }
    }
}

#[derive(Debug)]
pub struct Planner {
    strategy: Strategy,
    successors: Successors,
    tree: PlanTree,
    initial_plan: PlanId,
    frontier: Frontier,
    plateau: Option<Plateau>,
    plateau_enabled: bool,
    plateau_start: u32,
    plateau_limit: u32,
    /// Best expanded plan since the last plateau search started.
    best_plan: Option<PlanId>,
    solution: Option<PlanId>,
    quality: Option<QualitySelector>,
    statistics: SearchStatistics,
    termination: TerminationCondition,
    trace: Option<(PathBuf, BufWriter<File>)>,
}

impl Planner {
    /// Builds the frontier for `strategy` and expands the initial plan.
    pub fn new(
        strategy: Strategy,
        mut successors: Successors,
        config: &PlannerConfig,
        termination: TerminationCondition,
    ) -> Result<Self, PlannerError> {
        let (tree, initial_plan) = successors.initial_plan();
        let initial = tree.get(initial_plan);
        let informative_landmarks = successors.evaluator().informative_landmarks()
            || 1.5 * initial.h_land as f32 >= initial.h.into_inner();
        let has_tils = successors.num_tils() > 0;

        let single = |kinds: &[QueueKind]| Frontier::Single(Selector::new(kinds));
        let (frontier, plateau_enabled) = match strategy {
            Strategy::DeadEnds => {
                let (a, b) = if informative_landmarks {
                    (QueueOrdering::G2Hff, QueueOrdering::G3HLand)
                } else {
                    (QueueOrdering::GHff, QueueOrdering::Hff)
                };
                let frontier = Frontier::Alternating {
                    selectors: [
                        Selector::new(&[QueueKind::new(a)]),
                        Selector::new(&[QueueKind::new(b)]),
                    ],
                    current: 0,
                };
                (frontier, false)
            }
            Strategy::Reversible if informative_landmarks && has_tils => (
                single(&[
                    QueueKind::plateau(QueueOrdering::G2Hff),
                    QueueKind::plateau(QueueOrdering::G3HLand),
                ]),
                false,
            ),
            Strategy::Concurrent | Strategy::Reversible if informative_landmarks => (
                single(&[
                    QueueKind::new(QueueOrdering::Hff),
                    QueueKind::new(QueueOrdering::HLand),
                ]),
                !(strategy == Strategy::Reversible && has_tils),
            ),
            Strategy::Concurrent | Strategy::Reversible => (
                single(&[QueueKind::new(QueueOrdering::G3Hff)]),
                !(strategy == Strategy::Reversible && has_tils),
            ),
        };

        let (default_start, default_limit) = strategy.plateau_thresholds();
        let trace = match (&config.trace_file, strategy) {
            (Some(path), Strategy::Reversible) => {
                let file = File::create(path).map_err(|e| PlannerError::io(path, e))?;
                Some((path.clone(), BufWriter::new(file)))
            }
            _ => None,
        };
        info!(
            strategy = %strategy,
            informative_landmarks = informative_landmarks,
            time_initial_literals = successors.num_tils(),
            plateau_enabled = plateau_enabled,
        );

        let mut planner = Self {
            strategy,
            successors,
            tree,
            initial_plan,
            frontier,
            plateau: None,
            plateau_enabled,
            plateau_start: config.plateau_start.unwrap_or(default_start),
            plateau_limit: config.plateau_limit.unwrap_or(default_limit),
            best_plan: None,
            solution: None,
            quality: None,
            statistics: SearchStatistics::new(),
            termination,
            trace,
        };
        planner.add_initial_plans();
        Ok(planner)
    }

    fn add_initial_plans(&mut self) {
        let expansion = self.successors.expand(
            &mut self.tree,
            self.initial_plan,
            false,
            &mut self.statistics,
        );
        self.solution = expansion.solution;
        for id in expansion.children {
            self.frontier.add_initial(id, &self.tree);
        }
        self.write_trace(self.initial_plan);
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn tree(&self) -> &PlanTree {
        &self.tree
    }

    pub fn expanded_nodes(&self) -> usize {
        self.statistics.expanded_nodes()
    }

    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }

    pub fn solution(&self) -> Option<PlanId> {
        self.solution
    }

    /// Searches until a solution is found, the frontier is exhausted or the
    /// termination condition fires.
    pub fn plan(&mut self) -> Option<PlanId> {
        while self.solution.is_none() && !self.frontier.is_empty() {
            if let Some(reason) = self.termination.should_terminate() {
                info!(reason = %reason, "search stopped");
                break;
            }
            self.search_step();
            self.termination.log_if_needed();
        }
        if self.solution.is_none() && self.frontier.is_empty() {
            info!("search space exhausted");
        }
        self.flush_trace();
        self.solution
    }

    /// Polls and expands one plan of the frontier.
    pub fn search_step(&mut self) {
        let base = self.frontier.poll(&self.tree);
        if self.tree.get(base).expanded() {
            let children = self.tree.children(base).to_vec();
            for id in children {
                if !self.tree.get(id).action.is_goal() {
                    self.add_successor(id);
                }
            }
            return;
        }
        let expansion =
            self.successors
                .expand(&mut self.tree, base, false, &mut self.statistics);
        self.write_trace(base);
        if let Some(solution) = expansion.solution {
            info!(
                solution = solution,
                expanded_nodes = self.statistics.expanded_nodes(),
                "solution found"
            );
            self.solution = Some(solution);
            self.cancel_plateau();
            return;
        }
        self.update_best_plan(base);
        for id in expansion.children {
            self.add_successor(id);
        }
        if self.plateau_enabled {
            self.check_plateau();
        }
        self.frontier.switch();
    }

    fn update_best_plan(&mut self, base: PlanId) {
        let plan = self.tree.get(base);
        let better = match self.best_plan {
            None => true,
            Some(best) => {
                let best = self.tree.get(best);
                plan.h < best.h || (plan.h == best.h && plan.g <= best.g)
            }
        };
        if better {
            self.best_plan = Some(base);
        }
    }

    fn add_successor(&mut self, id: PlanId) {
        if self.frontier.add(id, &self.tree) && self.plateau.is_some() {
            self.cancel_plateau();
        }
    }

    fn selector_mut(&mut self) -> &mut Selector {
        match &mut self.frontier {
            Frontier::Single(selector) => selector,
            Frontier::Alternating { selectors, current } => &mut selectors[*current],
        }
    }

    fn cancel_plateau(&mut self) {
        if let Some(plateau) = self.plateau.take() {
            let Self {
                frontier,
                tree,
                successors,
                ..
            } = self;
            let selector = match frontier {
                Frontier::Single(selector) => selector,
                Frontier::Alternating { selectors, current } => &mut selectors[*current],
            };
            plateau.cancel(selector, tree, successors);
        }
    }

    /// Starts, advances or gives up the plateau search once the frontier
    /// stops improving.
    fn check_plateau(&mut self) {
        let (plateau_start, plateau_limit) = (self.plateau_start, self.plateau_limit);
        let best_h = self.selector_mut().best_h();
        if !self.selector_mut().in_plateau(plateau_start) {
            return;
        }
        if self.plateau.is_none() {
            if let Some(best_plan) = self.best_plan {
                if self.tree.get(best_plan).h <= OrderedFloat(best_h.into_inner() + 1.) {
                    self.plateau = Some(Plateau::new(
                        &self.tree,
                        best_plan,
                        best_h,
                        &mut self.successors,
                    ));
                    self.statistics.increment_plateaus();
                    self.best_plan = None;
                }
            }
        }
        let Some(plateau) = self.plateau.as_mut() else {
            return;
        };
        let near_goal = best_h <= OrderedFloat(NEAR_GOAL_H);
        let outcome = plateau.search_step(
            &mut self.tree,
            &mut self.successors,
            near_goal,
            &mut self.statistics,
        );
        let empty = plateau.is_empty();
        match outcome {
            PlateauOutcome::Solution(solution) => {
                self.solution = Some(solution);
                self.cancel_plateau();
            }
            PlateauOutcome::Improved(best) => {
                debug!(plan = best, "plateau search improved");
                self.statistics.increment_plateau_successes();
                let tree = &self.tree;
                match &mut self.frontier {
                    Frontier::Single(selector) => selector.set_best_plan(best, tree),
                    Frontier::Alternating { selectors, current } => {
                        selectors[*current].set_best_plan(best, tree)
                    }
                }
                self.cancel_plateau();
            }
            PlateauOutcome::NoImprovement => {
                if empty || self.selector_mut().in_plateau(plateau_limit) {
                    debug!("plateau search abandoned");
                    self.selector_mut()
                        .set_iterations_without_improving(plateau_start);
                    self.cancel_plateau();
                }
            }
        }
    }

    /// Looks for a solution strictly better than `(best_gc, best_g)`. The
    /// first call loads every open plan of the tree into a quality
    /// selector; later calls carry on from where the previous one stopped.
    pub fn improve_solution(&mut self, best_g: u32, best_gc: f32, first: bool) -> Option<PlanId> {
        match self.quality.as_mut() {
            Some(quality) if !first => quality.set_best_plan_quality(best_gc, best_g),
            _ => {
                let mut quality = QualitySelector::new(best_gc, best_g);
                for id in self.tree.frontier() {
                    quality.add(id, &self.tree);
                }
                debug!(open_plans = quality.len(), "anytime search started");
                self.quality = Some(quality);
            }
        }
        let quality = self.quality.as_mut()?;
        loop {
            if let Some(reason) = self.termination.should_terminate() {
                info!(reason = %reason, "anytime search stopped");
                return None;
            }
            self.termination.log_if_needed();
            let base = quality.poll(&self.tree)?;
            let children = if self.tree.get(base).expanded() {
                self.tree.children(base).to_vec()
            } else {
                let expansion =
                    self.successors
                        .expand(&mut self.tree, base, false, &mut self.statistics);
                expansion
                    .solution
                    .into_iter()
                    .chain(expansion.children)
                    .collect()
            };
            for id in children {
                let plan = self.tree.get(id);
                if plan.is_solution() {
                    if quality.improves(plan.gc, plan.g) {
                        info!(gc = plan.gc, g = plan.g, "improved solution found");
                        quality.set_best_plan_quality(plan.gc, plan.g);
                        self.solution = Some(id);
                        return Some(id);
                    }
                } else {
                    quality.add(id, &self.tree);
                }
            }
        }
    }

    /// The timed plan of the real actions on the path to `id`.
    pub fn plan_to_pddl(&self, id: PlanId) -> TimedPlan {
        let steps = self
            .tree
            .path(id)
            .into_iter()
            .map(|step| self.tree.get(step))
            .filter(|plan| !plan.action.is_fictitious() && !plan.action.is_goal())
            .map(|plan| TimedStep {
                start: plan.start,
                name: self.successors.action(plan.action).name.clone(),
                duration: plan.end - plan.start,
            })
            .collect();
        let plan = self.tree.get(id);
        TimedPlan::new(steps, plan.makespan, plan.gc)
    }

    pub fn finalise(&mut self) {
        self.statistics.finalise_search();
        self.termination.finalise();
    }

    fn trace_line(&self, plan: &Plan) -> String {
        let name = &self.successors.action(plan.action).name;
        let parent = plan
            .parent
            .map_or_else(|| "-".to_string(), |parent| parent.to_string());
        format!(
            "{}\t{}\t{}\t{}\t{:.3}\t{}\t{}\t{}",
            plan.id,
            parent,
            name,
            plan.g,
            plan.gc,
            format_h(plan.h),
            plan.h_land,
            plan.expanded()
        )
    }

    fn write_trace(&mut self, id: PlanId) {
        if self.trace.is_none() {
            return;
        }
        let line = self.trace_line(self.tree.get(id));
        if let Some((path, writer)) = self.trace.as_mut() {
            if let Err(e) = writeln!(writer, "{line}") {
                warn!(path = %path.display(), error = %e, "disabling trace output");
                self.trace = None;
            }
        }
    }

    fn flush_trace(&mut self) {
        if let Some((path, writer)) = self.trace.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(path = %path.display(), error = %e, "failed to flush trace");
            }
        }
    }
}

fn format_h(h: HeuristicValue) -> String {
    if h.into_inner().is_finite() {
        format!("{:.3}", h.into_inner())
    } else {
        "inf".to_string()
    }
}
