use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::lead::AssigneeId;

/// Placeholder capacity reported for every assignee; not enforced.
pub const DEFAULT_CAPACITY: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub assignee_id: AssigneeId,
    pub open_count: u64,
    pub capacity: u32,
}

/// Point-in-time count of leads held by each assignee.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    counts: HashMap<AssigneeId, u64>,
}

impl WorkloadSnapshot {
    pub fn from_counts(counts: impl IntoIterator<Item = (AssigneeId, u64)>) -> Self {
        let mut snapshot = Self::default();
        for (assignee, count) in counts {
            *snapshot.counts.entry(assignee).or_insert(0) += count;
        }
        snapshot
    }

    /// Assignees with no leads count as zero.
    pub fn count_for(&self, assignee: &AssigneeId) -> u64 {
        self.counts.get(assignee).copied().unwrap_or(0)
    }

    /// Entries for every assignee holding at least one lead, busiest first.
    pub fn entries(&self) -> Vec<WorkloadEntry> {
        let mut entries: Vec<WorkloadEntry> = self
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(assignee, count)| WorkloadEntry {
                assignee_id: assignee.clone(),
                open_count: *count,
                capacity: DEFAULT_CAPACITY,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.open_count.cmp(&a.open_count).then_with(|| a.assignee_id.cmp(&b.assignee_id))
        });
        entries
    }
}
