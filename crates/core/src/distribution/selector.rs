use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distribution::cursor::RoundRobinCursor;
use crate::domain::distribution::{DistributionMethod, DistributionRule, DistributionRuleId};
use crate::domain::lead::AssigneeId;
use crate::errors::SelectionError;
use crate::workload::WorkloadSnapshot;

/// Picks an assignee from a rule's pool using the rule's method.
///
/// `Ok(None)` means the pool offered nobody to pick (empty, or all weights
/// zero); callers move on to the next candidate rule.
pub struct AssignmentSelector {
    cursor: Arc<dyn RoundRobinCursor>,
    rng: Mutex<StdRng>,
}

impl AssignmentSelector {
    pub fn new(cursor: Arc<dyn RoundRobinCursor>) -> Self {
        Self { cursor, rng: Mutex::new(StdRng::from_entropy()) }
    }

    pub fn with_seed(cursor: Arc<dyn RoundRobinCursor>, seed: u64) -> Self {
        Self { cursor, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn select(
        &self,
        rule: &DistributionRule,
        workloads: Option<&WorkloadSnapshot>,
    ) -> Result<Option<AssigneeId>, SelectionError> {
        let pool = rule.assignees.as_slice();
        let selected = match rule.method {
            DistributionMethod::RoundRobin => self.round_robin(&rule.id, pool),
            DistributionMethod::Weighted => {
                let weights: Vec<f64> = pool.iter().map(|id| rule.weight_of(id)).collect();
                self.weighted(pool, &weights)
            }
            DistributionMethod::LoadBalanced => {
                let empty = WorkloadSnapshot::default();
                least_loaded(pool, workloads.unwrap_or(&empty))
            }
            DistributionMethod::Random => self.random(pool),
            method @ (DistributionMethod::SkillBased | DistributionMethod::Geographic) => {
                return Err(SelectionError::UnsupportedMethod(method));
            }
        };
        Ok(selected.cloned())
    }

    pub fn round_robin<'a>(
        &self,
        rule_id: &DistributionRuleId,
        pool: &'a [AssigneeId],
    ) -> Option<&'a AssigneeId> {
        if pool.is_empty() {
            return None;
        }
        let position = self.cursor.advance(rule_id);
        pool.get((position % pool.len() as u64) as usize)
    }

    /// `weights` is parallel to `pool`.
    pub fn weighted<'a>(&self, pool: &'a [AssigneeId], weights: &[f64]) -> Option<&'a AssigneeId> {
        let total: f64 = weights.iter().sum();
        if pool.is_empty() || !total.is_finite() || total <= 0.0 {
            return None;
        }
        let draw = self.with_rng(|rng| rng.gen_range(0.0..total));
        weighted_pick(pool, weights, draw)
    }

    pub fn random<'a>(&self, pool: &'a [AssigneeId]) -> Option<&'a AssigneeId> {
        if pool.is_empty() {
            return None;
        }
        let index = self.with_rng(|rng| rng.gen_range(0..pool.len()));
        pool.get(index)
    }

    fn with_rng<T>(&self, draw: impl FnOnce(&mut StdRng) -> T) -> T {
        match self.rng.lock() {
            Ok(mut rng) => draw(&mut *rng),
            Err(poisoned) => draw(&mut *poisoned.into_inner()),
        }
    }
}

/// Walks the pool subtracting each member's weight from `draw`; the first
/// member at which the remainder drops to zero or below wins.
pub fn weighted_pick<'a>(
    pool: &'a [AssigneeId],
    weights: &[f64],
    draw: f64,
) -> Option<&'a AssigneeId> {
    let mut remainder = draw;
    for (assignee, weight) in pool.iter().zip(weights) {
        remainder -= weight;
        if remainder <= 0.0 {
            return Some(assignee);
        }
    }
    // float rounding can leave a sliver past the last member
    pool.iter().zip(weights).rev().find(|(_, weight)| **weight > 0.0).map(|(assignee, _)| assignee)
}

/// Strictly lowest count wins; ties keep pool order.
pub fn least_loaded<'a>(
    pool: &'a [AssigneeId],
    workloads: &WorkloadSnapshot,
) -> Option<&'a AssigneeId> {
    let mut best: Option<(&AssigneeId, u64)> = None;
    for assignee in pool {
        let count = workloads.count_for(assignee);
        match best {
            Some((_, lowest)) if count >= lowest => {}
            _ => best = Some((assignee, count)),
        }
    }
    best.map(|(assignee, _)| assignee)
}
