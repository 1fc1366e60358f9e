use derive_more::Display;

use crate::solver::Domain;

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[display("x{_0}")]
pub struct VarId(pub usize);

/// Some domain got wiped out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Inconsistency;

/// Outcome of a domain operation: whether the domain changed, or an inconsistency.
pub type Propagation<T = bool> = std::result::Result<T, Inconsistency>;

/// Variable domains with a trail of previous domains.
#[must_use]
#[derive(Default)]
pub struct Store {
    domains: Vec<Domain>,

    /// Previous domains, restored in reverse order on backtracking.
    trail: Vec<(VarId, Domain)>,

    /// Variables modified since the last [`Store::take_modified`].
    modified: Vec<VarId>,
}

impl Store {
    pub fn new_var(&mut self, domain: Domain) -> VarId {
        let id = VarId(self.domains.len());
        self.domains.push(domain);
        id
    }

    #[must_use]
    pub const fn n_vars(&self) -> usize {
        self.domains.len()
    }

    #[must_use]
    pub fn domain(&self, var: VarId) -> &Domain {
        &self.domains[var.0]
    }

    #[must_use]
    pub fn min(&self, var: VarId) -> i64 {
        self.domains[var.0].min()
    }

    #[must_use]
    pub fn max(&self, var: VarId) -> i64 {
        self.domains[var.0].max()
    }

    #[must_use]
    pub fn is_fixed(&self, var: VarId) -> bool {
        self.domains[var.0].is_fixed()
    }

    #[must_use]
    pub fn value(&self, var: VarId) -> Option<i64> {
        self.domains[var.0].value()
    }

    /// Lower bounds of every variable, which are the values once everything is fixed.
    #[must_use]
    pub fn snapshot(&self) -> Vec<i64> {
        self.domains.iter().map(Domain::min).collect()
    }

    pub fn set_min(&mut self, var: VarId, min: i64) -> Propagation {
        let domain = &self.domains[var.0];
        if min <= domain.min() {
            Ok(false)
        } else {
            let restricted = domain.restricted(min, domain.max()).ok_or(Inconsistency)?;
            self.update(var, restricted)
        }
    }

    pub fn set_max(&mut self, var: VarId, max: i64) -> Propagation {
        let domain = &self.domains[var.0];
        if max >= domain.max() {
            Ok(false)
        } else {
            let restricted = domain.restricted(domain.min(), max).ok_or(Inconsistency)?;
            self.update(var, restricted)
        }
    }

    pub fn set_bounds(&mut self, var: VarId, min: i64, max: i64) -> Propagation {
        Ok(self.set_min(var, min)? | self.set_max(var, max)?)
    }

    pub fn assign(&mut self, var: VarId, value: i64) -> Propagation {
        let domain = &self.domains[var.0];
        if !domain.contains(value) {
            Err(Inconsistency)
        } else if domain.is_fixed() {
            Ok(false)
        } else {
            let fixed = match domain {
                Domain::Interval { .. } => Domain::fixed(value),
                Domain::Values(_) => Domain::Values(vec![value]),
            };
            self.update(var, fixed)
        }
    }

    pub fn remove(&mut self, var: VarId, value: i64) -> Propagation {
        let domain = &self.domains[var.0];
        if !domain.contains(value) {
            return Ok(false);
        }
        let reduced = domain.without(value).ok_or(Inconsistency)?;
        if reduced == *domain { Ok(false) } else { self.update(var, reduced) }
    }

    /// Keep the values satisfying the predicate.
    ///
    /// Intervals are only trimmed from both ends.
    pub fn retain(&mut self, var: VarId, mut predicate: impl FnMut(i64) -> bool) -> Propagation {
        let domain = &self.domains[var.0];
        let retained = match domain {
            Domain::Interval { min, max } => {
                let min = (*min..=*max).find(|value| predicate(*value)).ok_or(Inconsistency)?;
                let max = (min..=*max).rev().find(|value| predicate(*value)).unwrap_or(min);
                Domain::interval(min, max)
            }
            Domain::Values(values) => {
                Domain::values(values.iter().copied().filter(|value| predicate(*value)))
                    .ok_or(Inconsistency)?
            }
        };
        if retained == *domain { Ok(false) } else { self.update(var, retained) }
    }

    /// Current trail position, to [`Store::undo`] to later.
    #[must_use]
    pub const fn mark(&self) -> usize {
        self.trail.len()
    }

    /// Restore every domain as it was at the mark.
    pub fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some((var, domain)) = self.trail.pop() else { break };
            self.domains[var.0] = domain;
        }
        self.modified.clear();
    }

    pub fn take_modified(&mut self) -> Vec<VarId> {
        std::mem::take(&mut self.modified)
    }

    fn update(&mut self, var: VarId, domain: Domain) -> Propagation {
        let previous = std::mem::replace(&mut self.domains[var.0], domain);
        self.trail.push((var, previous));
        self.modified.push(var);
        Ok(true)
    }
}
