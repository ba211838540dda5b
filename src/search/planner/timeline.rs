//! Timed view of a plan: every discrete and numeric effect of every step,
//! placed at the time it happens. An effect at time `t` can be relied upon by
//! conditions from `t + EPSILON` on.

use crate::search::planner::{end_point, start_point, ActionRef, PlanId, PlanTree, TimePoint};
use crate::search::{
    Action, Fact, NumericEffect, State, Task, ValueId, VarId, EPSILON, UNDEFINED_VALUE,
};

/// Slack for comparing times built from sums of floats.
pub const TIME_TOLERANCE: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub action: ActionRef,
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    time: f32,
    point: TimePoint,
    fact: Fact,
}

#[derive(Debug, Clone, Copy)]
struct NumericEvent {
    time: f32,
    point: TimePoint,
    effect: NumericEffect,
}

#[derive(Debug, Clone)]
pub struct Timeline<'a> {
    task: &'a Task,
    fictitious: &'a [Action],
    steps: Vec<Step>,
    /// Sorted by time, then by time point.
    events: Vec<Event>,
    numeric_events: Vec<NumericEvent>,
}

impl<'a> Timeline<'a> {
    pub fn new(task: &'a Task, fictitious: &'a [Action]) -> Self {
        Self {
            task,
            fictitious,
            steps: vec![],
            events: vec![],
            numeric_events: vec![],
        }
    }

    /// The timeline of the plan ending at `id`.
    pub fn from_plan(task: &'a Task, fictitious: &'a [Action], tree: &PlanTree, id: PlanId) -> Self {
        let mut timeline = Self::new(task, fictitious);
        for plan_id in tree.path(id) {
            let plan = tree.get(plan_id);
            timeline.push_step(Step {
                action: plan.action,
                start: plan.start,
                end: plan.end,
            });
        }
        timeline
    }

    pub fn action(&self, step: usize) -> &'a Action {
        self.steps[step].action.resolve(self.task, self.fictitious)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends a step with all its effects.
    pub fn push_step(&mut self, step: Step) {
        let index = self.steps.len();
        self.steps.push(step);
        let action = self.action(index);
        if step.action.is_fictitious() {
            // Fictitious effects are already visible at their fixed time.
            let time = step.end - EPSILON;
            self.add_effects(&action.end_eff, &action.end_num_eff, time, end_point(index));
        } else {
            self.add_effects(&action.start_eff, &action.start_num_eff, step.start, start_point(index));
            self.add_effects(&action.end_eff, &action.end_num_eff, step.end, end_point(index));
        }
    }

    /// Removes the last step and its effects.
    pub fn pop_step(&mut self) -> Option<Step> {
        let step = self.steps.pop()?;
        let points = [start_point(self.steps.len()), end_point(self.steps.len())];
        self.events.retain(|e| !points.contains(&e.point));
        self.numeric_events.retain(|e| !points.contains(&e.point));
        Some(step)
    }

    fn add_effects(
        &mut self,
        effects: &[Fact],
        numeric_effects: &[NumericEffect],
        time: f32,
        point: TimePoint,
    ) {
        let not_after = |t: f32, p: TimePoint| t < time || (t == time && p <= point);
        for fact in effects {
            let at = self.events.partition_point(|e| not_after(e.time, e.point));
            self.events.insert(
                at,
                Event {
                    time,
                    point,
                    fact: *fact,
                },
            );
        }
        for effect in numeric_effects {
            let at = self
                .numeric_events
                .partition_point(|e| not_after(e.time, e.point));
            self.numeric_events.insert(
                at,
                NumericEvent {
                    time,
                    point,
                    effect: *effect,
                },
            );
        }
    }

    #[inline]
    fn visible(event_time: f32, time: f32) -> bool {
        event_time + EPSILON <= time + TIME_TOLERANCE
    }

    /// Value of `var` at `time` and the point that produced it.
    pub fn value_at(&self, var: VarId, time: f32) -> Option<(ValueId, TimePoint)> {
        self.events
            .iter()
            .take_while(|e| Self::visible(e.time, time))
            .filter(|e| e.fact.var == var)
            .last()
            .map(|e| (e.fact.value, e.point))
    }

    pub fn holds_at(&self, fact: &Fact, time: f32) -> bool {
        matches!(self.value_at(fact.var, time), Some((value, _)) if value == fact.value)
    }

    /// Whether some step ever sets `fact`.
    pub fn ever_holds(&self, fact: &Fact) -> bool {
        self.events.iter().any(|e| e.fact == *fact)
    }

    /// Point that supports `fact` at `time`, if it holds.
    pub fn supporter(&self, fact: &Fact, time: f32) -> Option<TimePoint> {
        match self.value_at(fact.var, time) {
            Some((value, point)) if value == fact.value => Some(point),
            _ => None,
        }
    }

    /// Whether `fact` holds over the whole interval `[from, to]`.
    pub fn holds_during(&self, fact: &Fact, from: f32, to: f32) -> bool {
        self.holds_at(fact, from)
            && self
                .events
                .iter()
                .filter(|e| e.fact.var == fact.var)
                .filter(|e| !Self::visible(e.time, from) && Self::visible(e.time, to))
                .all(|e| e.fact.value == fact.value)
    }

    /// Whether another event sets `fact.var` to a different value at the
    /// same time as an event of `step`.
    pub fn has_conflicting_effects(&self, step: usize) -> bool {
        let points = [start_point(step), end_point(step)];
        self.events
            .iter()
            .filter(|e| points.contains(&e.point))
            .any(|own| {
                self.events.iter().any(|other| {
                    !points.contains(&other.point)
                        && other.fact.var == own.fact.var
                        && other.fact.value != own.fact.value
                        && (other.time - own.time).abs() <= TIME_TOLERANCE
                })
            })
    }

    pub fn numeric_state_at(&self, time: f32) -> Vec<f32> {
        let mut numeric = vec![0.; self.task.numeric_variables.len()];
        for event in self
            .numeric_events
            .iter()
            .take_while(|e| Self::visible(e.time, time))
        {
            event.effect.apply(&mut numeric);
        }
        numeric
    }

    /// The state once every effect of the plan has happened.
    pub fn final_state(&self) -> State {
        let mut values = vec![UNDEFINED_VALUE; self.task.num_variables()];
        for event in &self.events {
            values[event.fact.var as usize] = event.fact.value;
        }
        let mut numeric = vec![0.; self.task.numeric_variables.len()];
        for event in &self.numeric_events {
            event.effect.apply(&mut numeric);
        }
        State::new(values, numeric)
    }

    /// Latest start of a real action, zero if there is none.
    pub fn last_start(&self) -> f32 {
        self.steps
            .iter()
            .filter(|s| !s.action.is_fictitious())
            .map(|s| s.start)
            .fold(0., f32::max)
    }

    /// Times from `from` on at which the timeline changes, starting with
    /// `from` itself.
    pub fn candidate_epochs(&self, from: f32) -> Vec<f32> {
        let times = self
            .events
            .iter()
            .map(|e| e.time)
            .chain(self.numeric_events.iter().map(|e| e.time));
        let mut epochs = vec![from];
        epochs.extend(
            times
                .map(|time| time + EPSILON)
                .filter(|epoch| *epoch > from + TIME_TOLERANCE),
        );
        epochs.sort_by(f32::total_cmp);
        epochs.dedup_by(|a, b| (*a - *b).abs() <= TIME_TOLERANCE);
        epochs
    }

    /// Whether the start and over-all conditions of `step`, and the end
    /// conditions not listed in `open`, hold. Only conditions on `vars` are
    /// checked.
    pub fn step_conditions_hold(&self, step: usize, vars: &[VarId], open: &[Fact]) -> bool {
        let Step { start, end, .. } = self.steps[step];
        let action = self.action(step);
        let relevant = |fact: &&Fact| vars.contains(&fact.var);
        action
            .start_cond
            .iter()
            .filter(relevant)
            .all(|c| self.holds_at(c, start))
            && action
                .over_cond
                .iter()
                .filter(relevant)
                .all(|c| self.holds_during(c, start, end))
            && action
                .end_cond
                .iter()
                .filter(relevant)
                .filter(|c| !open.contains(c))
                .all(|c| self.holds_at(c, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::planner::Plan;
    use crate::test_utils::*;

    fn chain_timeline<'a>(task: &'a Task, fictitious: &'a [Action]) -> Timeline<'a> {
        let tree = PlanTree::new(Plan::fictitious(0, 0., task.initial_state()));
        let mut timeline = Timeline::from_plan(task, fictitious, &tree, tree.root());
        // a1 over [0, 2]
        timeline.push_step(Step {
            action: ActionRef::Task(0),
            start: 0.,
            end: 2.,
        });
        timeline
    }

    #[test]
    fn effects_become_visible_after_epsilon() {
        let task = chain_task();
        let fictitious = vec![initial_action(&task)];
        let timeline = chain_timeline(&task, &fictitious);

        assert!(timeline.holds_at(&Fact::new(0, 1), 0.));
        assert!(timeline.holds_at(&Fact::new(1, 0), 2.));
        assert!(!timeline.holds_at(&Fact::new(1, 1), 2.));
        assert!(timeline.holds_at(&Fact::new(1, 1), 2. + EPSILON));
        assert_eq!(timeline.supporter(&Fact::new(1, 1), 3.), Some(end_point(1)));
        assert_eq!(timeline.supporter(&Fact::new(0, 1), 3.), Some(end_point(0)));
        assert!(timeline.holds_during(&Fact::new(1, 0), 0., 2.));
        assert!(!timeline.holds_during(&Fact::new(1, 0), 0., 2.5));
        assert_eq!(timeline.final_state().values, vec![1, 1, 0]);
        assert_eq!(timeline.last_start(), 0.);
    }

    #[test]
    fn epochs_follow_events() {
        let task = chain_task();
        let fictitious = vec![initial_action(&task)];
        let timeline = chain_timeline(&task, &fictitious);
        let epochs = timeline.candidate_epochs(0.);
        assert_eq!(epochs.len(), 2);
        assert_eq!(epochs[0], 0.);
        assert!((epochs[1] - (2. + EPSILON)).abs() < TIME_TOLERANCE);
    }

    #[test]
    fn steps_can_be_pushed_out_of_time_order() {
        let task = chain_task();
        let fictitious = vec![initial_action(&task)];
        let mut timeline = chain_timeline(&task, &fictitious);
        // a2 over [0.5, 1.5], inside a1
        timeline.push_step(Step {
            action: ActionRef::Task(1),
            start: 0.5,
            end: 1.5,
        });
        assert!(timeline
            .events
            .windows(2)
            .all(|pair| (pair[0].time, pair[0].point) <= (pair[1].time, pair[1].point)));
        assert_eq!(timeline.supporter(&Fact::new(2, 1), 1.6), Some(end_point(2)));
        assert_eq!(timeline.supporter(&Fact::new(1, 1), 2.5), Some(end_point(1)));

        let popped = timeline.pop_step().unwrap();
        assert_eq!(popped.action, ActionRef::Task(1));
        assert_eq!(timeline.len(), 2);
        assert!(!timeline.ever_holds(&Fact::new(2, 1)));
        assert_eq!(timeline.final_state().values, vec![1, 1, 0]);
    }

    #[test]
    fn simultaneous_conflicting_effects() {
        let task = dead_end_task();
        let fictitious = vec![initial_action(&task)];
        let tree = PlanTree::new(Plan::fictitious(0, 0., task.initial_state()));
        let mut timeline = Timeline::from_plan(&task, &fictitious, &tree, tree.root());
        // walk and fall both end at 1
        timeline.push_step(Step {
            action: ActionRef::Task(0),
            start: 0.,
            end: 1.,
        });
        assert!(!timeline.has_conflicting_effects(1));
        timeline.push_step(Step {
            action: ActionRef::Task(1),
            start: 0.,
            end: 1.,
        });
        assert!(timeline.has_conflicting_effects(2));
        assert!(timeline.has_conflicting_effects(1));
    }
}
