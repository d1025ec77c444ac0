use std::collections::HashSet;

use crate::plan::{ActionId, StructuredPlan};

/// Pending cursor move issued by [`Walkthrough::toggle_current`]. The UI waits
/// a moment and then hands it to [`Walkthrough::commit_auto_advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoAdvance {
    generation: u64,
    from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Marked done; carries the auto-advance unless this was the last action.
    Completed(Option<AutoAdvance>),
    /// Marked not done; the cursor stays put.
    Reopened,
    /// Nothing to toggle.
    Inert,
}

/// One-action-at-a-time walkthrough state over a plan. Holds only keys and
/// per-step sizes; every metric is derived on read.
#[derive(Debug, Clone, Default)]
pub struct Walkthrough {
    order: Vec<ActionId>,
    step_sizes: Vec<usize>,
    completed: HashSet<ActionId>,
    cursor: usize,
    generation: u64,
}

impl Walkthrough {
    pub fn new(plan: &StructuredPlan) -> Self {
        let mut w = Self::default();
        w.load(plan);
        w
    }

    fn load(&mut self, plan: &StructuredPlan) {
        self.order = plan.action_ids();
        self.step_sizes = plan.steps.iter().map(|s| s.actions.len()).collect();
        self.completed.clear();
        self.cursor = 0;
    }

    /// Switches to a freshly generated plan: keys rebuilt from its shape,
    /// completion cleared, cursor back to the first action.
    pub fn reset(&mut self, plan: &StructuredPlan) {
        self.load(plan);
        self.generation += 1;
    }

    pub fn total(&self) -> usize {
        self.order.len()
    }

    pub fn is_inert(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<ActionId> {
        self.order.get(self.cursor).copied()
    }

    fn at_last(&self) -> bool {
        self.cursor + 1 >= self.total()
    }

    pub fn is_completed(&self, id: ActionId) -> bool {
        self.completed.contains(&id)
    }

    pub fn toggle_current(&mut self) -> Toggle {
        let Some(id) = self.current() else {
            return Toggle::Inert;
        };
        if self.completed.remove(&id) {
            return Toggle::Reopened;
        }
        self.completed.insert(id);
        if self.at_last() {
            Toggle::Completed(None)
        } else {
            Toggle::Completed(Some(AutoAdvance { generation: self.generation, from: self.cursor, to: self.cursor + 1 }))
        }
    }

    /// Applies a delayed auto-advance. Ignored when the plan was replaced,
    /// the cursor moved, or the action was reopened in the meantime.
    pub fn commit_auto_advance(&mut self, advance: AutoAdvance) -> bool {
        let still_valid = advance.generation == self.generation
            && advance.from == self.cursor
            && advance.to < self.total()
            && self.current().is_some_and(|id| self.completed.contains(&id));
        if still_valid {
            self.cursor = advance.to;
        }
        still_valid
    }

    /// Marks the current action done and moves one forward unless already
    /// on the last action.
    pub fn complete_and_advance(&mut self) {
        let Some(id) = self.current() else {
            return;
        };
        self.completed.insert(id);
        if !self.at_last() {
            self.cursor += 1;
        }
    }

    /// Moves the cursor, clamped into range. Completion is untouched.
    pub fn go_to(&mut self, index: usize) {
        if self.is_inert() {
            return;
        }
        self.cursor = index.min(self.total() - 1);
    }

    pub fn completed_count(&self) -> usize {
        self.order.iter().filter(|id| self.completed.contains(id)).count()
    }

    pub fn progress_percent(&self) -> u32 {
        if self.is_inert() {
            return 0;
        }
        (100.0 * self.completed_count() as f64 / self.total() as f64).round() as u32
    }

    pub fn is_step_complete(&self, step: usize) -> bool {
        match self.step_sizes.get(step) {
            Some(&n) if n > 0 => (0..n).all(|action| self.completed.contains(&ActionId { step, action })),
            _ => false,
        }
    }

    /// First step, in plan order, with an action still open.
    pub fn next_incomplete_step(&self) -> Option<usize> {
        (0..self.step_sizes.len()).find(|&s| self.step_sizes[s] > 0 && !self.is_step_complete(s))
    }

    /// Flattened index of a step's first action.
    pub fn flat_index_of_step(&self, step: usize) -> Option<usize> {
        self.order.iter().position(|id| id.step == step)
    }

    pub fn step_count(&self) -> usize {
        self.step_sizes.len()
    }
}
