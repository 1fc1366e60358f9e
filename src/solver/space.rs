use std::collections::VecDeque;

use derive_more::{Deref, DerefMut};

use crate::solver::{Constraint, Domain, Propagation, Store, VarId};

/// Constraint network over a [`Store`].
///
/// Dereferences to the store, so that domains can be read and narrowed directly.
#[must_use]
#[derive(Default, Deref, DerefMut)]
pub struct Space {
    #[deref]
    #[deref_mut]
    store: Store,

    constraints: Vec<Constraint>,

    /// Constraint indices per variable.
    watchers: Vec<Vec<usize>>,

    queue: VecDeque<usize>,
    is_queued: Vec<bool>,
}

impl Space {
    pub fn new_var(&mut self, domain: Domain) -> VarId {
        self.watchers.push(Vec::new());
        self.store.new_var(domain)
    }

    #[must_use]
    pub const fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Add the constraint to the network and schedule it for propagation.
    pub fn post(&mut self, constraint: Constraint) {
        let index = self.constraints.len();
        for var in constraint.variables() {
            let watchers = &mut self.watchers[var.0];
            if watchers.last() != Some(&index) {
                watchers.push(index);
            }
        }
        self.constraints.push(constraint);
        self.is_queued.push(false);
        self.enqueue(index);
    }

    /// Run the scheduled constraints and the ones watching modified variables, until fixpoint.
    pub fn propagate(&mut self) -> Propagation<()> {
        self.schedule_modified();
        while let Some(index) = self.queue.pop_front() {
            self.is_queued[index] = false;
            if let Err(inconsistency) = self.constraints[index].propagate(&mut self.store) {
                self.store.take_modified();
                self.clear_queue();
                return Err(inconsistency);
            }
            self.schedule_modified();
        }
        Ok(())
    }

    /// Restore every domain as it was at the mark, dropping any pending propagation.
    pub fn undo(&mut self, mark: usize) {
        self.store.undo(mark);
        self.clear_queue();
    }

    fn schedule_modified(&mut self) {
        for var in self.store.take_modified() {
            for watcher_index in 0..self.watchers[var.0].len() {
                self.enqueue(self.watchers[var.0][watcher_index]);
            }
        }
    }

    fn enqueue(&mut self, index: usize) {
        if !self.is_queued[index] {
            self.is_queued[index] = true;
            self.queue.push_back(index);
        }
    }

    fn clear_queue(&mut self) {
        for index in self.queue.drain(..) {
            self.is_queued[index] = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Inconsistency, Linear};

    #[test]
    fn test_propagation_reaches_fixpoint() {
        // x + y = 10, y - z = 0, y + z ≤ 15, z ∈ 7..=8:
        let mut space = Space::default();
        let x = space.new_var(Domain::interval(0, 10));
        let y = space.new_var(Domain::interval(0, 10));
        let z = space.new_var(Domain::interval(7, 8));
        space.post(Constraint::LinearEq(Linear::new([(1, x), (1, y)], -10)));
        space.post(Constraint::LinearEq(Linear::new([(1, y), (-1, z)], 0)));
        space.post(Constraint::LinearLe(Linear::new([(1, y), (1, z)], -15)));
        assert_eq!(space.propagate(), Ok(()));
        assert_eq!(space.domain(x), &Domain::interval(2, 3));

        let mark = space.mark();
        assert_eq!(space.assign(x, 3), Ok(true));
        assert_eq!(space.propagate(), Ok(()));
        assert_eq!(space.value(z), Some(7));

        space.undo(mark);
        // `x = 2` forces `y = z = 8`, which only the sum refutes:
        assert_eq!(space.set_max(x, 2), Ok(true));
        assert_eq!(space.propagate(), Err(Inconsistency));
    }
}
