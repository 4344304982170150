use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::distribution::{DistributionMethod, DistributionRule, DistributionRuleId};
use crate::domain::lead::{AssigneeId, Lead};

/// Descending priority; ties fall back to creation order, then id.
pub fn compare_priority(a: &DistributionRule, b: &DistributionRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn order_rules(rules: &mut [DistributionRule]) {
    rules.sort_by(compare_priority);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStage {
    Matched,
    Fallback,
}

impl RouteStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteCandidate<'a> {
    pub rule: &'a DistributionRule,
    pub stage: RouteStage,
}

/// Outcome of a successful automatic assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub assignee: AssigneeId,
    pub rule_id: DistributionRuleId,
    pub rule_name: String,
    pub method: DistributionMethod,
    pub stage: RouteStage,
}

impl RouteDecision {
    pub fn new(candidate: &RouteCandidate<'_>, assignee: AssigneeId) -> Self {
        Self {
            assignee,
            rule_id: candidate.rule.id.clone(),
            rule_name: candidate.rule.name.clone(),
            method: candidate.rule.method,
            stage: candidate.stage,
        }
    }
}

/// Rules to try for `lead`, in order.
///
/// Active rules whose conditions match come first, highest priority first.
/// The highest-priority active rule is appended as the fallback unless it
/// already appears among the matches. Callers stop at the first candidate
/// whose selection yields an assignee.
pub fn plan_route<'a>(lead: &Lead, rules: &'a [DistributionRule]) -> Vec<RouteCandidate<'a>> {
    let mut active: Vec<&DistributionRule> = rules.iter().filter(|rule| rule.active).collect();
    active.sort_by(|a, b| compare_priority(a, b));

    let mut candidates: Vec<RouteCandidate<'a>> = active
        .iter()
        .copied()
        .filter(|rule| rule.matches(lead))
        .map(|rule| RouteCandidate { rule, stage: RouteStage::Matched })
        .collect();

    if let Some(&fallback) = active.first() {
        let already_planned = candidates.iter().any(|candidate| candidate.rule.id == fallback.id);
        if !already_planned {
            candidates.push(RouteCandidate { rule: fallback, stage: RouteStage::Fallback });
        }
    }

    candidates
}
