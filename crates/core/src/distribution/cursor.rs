use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::distribution::DistributionRuleId;

/// Source of round-robin positions.
///
/// `advance` returns the position for the current selection and moves the
/// cursor forward by exactly one, atomically with respect to other callers.
pub trait RoundRobinCursor: Send + Sync {
    fn advance(&self, rule_id: &DistributionRuleId) -> u64;
}

/// Single counter shared by every round-robin rule in the process.
#[derive(Debug, Default)]
pub struct GlobalCursor {
    next: AtomicU64,
}

impl GlobalCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl RoundRobinCursor for GlobalCursor {
    fn advance(&self, _rule_id: &DistributionRuleId) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// One counter per rule id.
#[derive(Debug, Default)]
pub struct PerRuleCursor {
    positions: Mutex<HashMap<DistributionRuleId, u64>>,
}

impl PerRuleCursor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoundRobinCursor for PerRuleCursor {
    fn advance(&self, rule_id: &DistributionRuleId) -> u64 {
        let mut positions = match self.positions.lock() {
            Ok(positions) => positions,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = positions.entry(rule_id.clone()).or_insert(0);
        let current = *slot;
        *slot = slot.wrapping_add(1);
        current
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorScope {
    #[default]
    Global,
    PerRule,
}

impl CursorScope {
    pub fn build(self) -> Arc<dyn RoundRobinCursor> {
        match self {
            Self::Global => Arc::new(GlobalCursor::new()),
            Self::PerRule => Arc::new(PerRuleCursor::new()),
        }
    }
}
