use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::{AssigneeId, Lead, LeadId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributionRuleId(pub String);

impl DistributionRuleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for DistributionRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMethod {
    RoundRobin,
    Weighted,
    LoadBalanced,
    Random,
    SkillBased,
    Geographic,
}

impl DistributionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Weighted => "weighted",
            Self::LoadBalanced => "load_balanced",
            Self::Random => "random",
            Self::SkillBased => "skill_based",
            Self::Geographic => "geographic",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" => Some(Self::RoundRobin),
            "weighted" => Some(Self::Weighted),
            "load_balanced" => Some(Self::LoadBalanced),
            "random" => Some(Self::Random),
            "skill_based" => Some(Self::SkillBased),
            "geographic" => Some(Self::Geographic),
            _ => None,
        }
    }
}

impl fmt::Display for DistributionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicates a distribution rule may place on a lead. Only the lead source
/// participates in routing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoutingCondition {
    SourceEquals(String),
}

impl RoutingCondition {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            Self::SourceEquals(expected) => lead.source.as_deref() == Some(expected.as_str()),
        }
    }
}

/// Accepted and stored, not enforced by the selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
    pub timezone: String,
    #[serde(default)]
    pub days: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionRule {
    pub id: DistributionRuleId,
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub method: DistributionMethod,
    pub conditions: Vec<RoutingCondition>,
    /// Ordered pool; order drives round-robin and load-balanced tie-breaks.
    pub assignees: Vec<AssigneeId>,
    pub weights: BTreeMap<AssigneeId, f64>,
    pub max_leads_per_assignee: Option<u32>,
    pub working_hours: Option<WorkingHours>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DistributionRule {
    pub fn matches(&self, lead: &Lead) -> bool {
        self.conditions.iter().all(|condition| condition.matches(lead))
    }

    /// Relative weight of a pool member; members without an entry weigh 1.
    pub fn weight_of(&self, assignee: &AssigneeId) -> f64 {
        self.weights.get(assignee).copied().unwrap_or(1.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionRuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i32,
    pub method: DistributionMethod,
    #[serde(default)]
    pub conditions: Vec<RoutingCondition>,
    #[serde(default)]
    pub assignees: Vec<AssigneeId>,
    #[serde(default)]
    pub weights: BTreeMap<AssigneeId, f64>,
    #[serde(default)]
    pub max_leads_per_assignee: Option<u32>,
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl DistributionRuleDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation(
                "distribution rule name must not be empty".to_string(),
            ));
        }

        for (assignee, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(DomainError::Validation(format!(
                    "weight for assignee `{assignee}` must be a non-negative number"
                )));
            }
            if !self.assignees.contains(assignee) {
                return Err(DomainError::Validation(format!(
                    "weight given for `{assignee}` who is not in the assignee pool"
                )));
            }
        }

        let total: f64 = self.weights.values().sum();
        if !total.is_finite() {
            return Err(DomainError::Validation(
                "assignee weights must sum to a finite number".to_string(),
            ));
        }

        Ok(())
    }

    pub fn into_rule(
        self,
        id: DistributionRuleId,
        now: DateTime<Utc>,
    ) -> Result<DistributionRule, DomainError> {
        self.validate()?;
        Ok(DistributionRule {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            priority: self.priority,
            method: self.method,
            conditions: self.conditions,
            assignees: self.assignees,
            weights: self.weights,
            max_leads_per_assignee: self.max_leads_per_assignee,
            working_hours: self.working_hours,
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_to(
        self,
        rule: &mut DistributionRule,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.validate()?;
        rule.name = self.name.trim().to_string();
        rule.description = self.description;
        rule.priority = self.priority;
        rule.method = self.method;
        rule.conditions = self.conditions;
        rule.assignees = self.assignees;
        rule.weights = self.weights;
        rule.max_leads_per_assignee = self.max_leads_per_assignee;
        rule.working_hours = self.working_hours;
        rule.active = self.active;
        rule.updated_at = now;
        Ok(())
    }
}

/// How an assignee write came about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentOrigin {
    Rule { rule_id: DistributionRuleId, method: DistributionMethod },
    Manual { reason: Option<String> },
    Bulk,
}

/// Audit row written together with every assignee change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: String,
    pub lead_id: LeadId,
    pub previous_assignee: Option<AssigneeId>,
    pub assignee: AssigneeId,
    pub origin: AssignmentOrigin,
    pub assigned_at: DateTime<Utc>,
}

impl AssignmentRecord {
    /// `previous_assignee` is filled in by the store at write time.
    pub fn new(lead_id: LeadId, assignee: AssigneeId, origin: AssignmentOrigin) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id,
            previous_assignee: None,
            assignee,
            origin,
            assigned_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::{DistributionMethod, DistributionRuleDraft, DistributionRuleId, RoutingCondition};
    use crate::domain::lead::{AssigneeId, Lead};

    fn draft() -> DistributionRuleDraft {
        DistributionRuleDraft {
            name: "Inbound web".to_string(),
            description: None,
            priority: 10,
            method: DistributionMethod::Weighted,
            conditions: vec![RoutingCondition::SourceEquals("web".to_string())],
            assignees: vec![AssigneeId::from("a"), AssigneeId::from("b")],
            weights: BTreeMap::new(),
            max_leads_per_assignee: None,
            working_hours: None,
            active: true,
        }
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let mut draft = draft();
        draft.weights.insert(AssigneeId::from("a"), 3.0);
        let rule = draft.into_rule(DistributionRuleId::generate(), Utc::now()).expect("valid");

        assert_eq!(rule.weight_of(&AssigneeId::from("a")), 3.0);
        assert_eq!(rule.weight_of(&AssigneeId::from("b")), 1.0);
    }

    #[test]
    fn rejects_weights_outside_the_pool_or_negative() {
        let mut outside = draft();
        outside.weights.insert(AssigneeId::from("z"), 2.0);
        assert!(outside.validate().is_err());

        let mut negative = draft();
        negative.weights.insert(AssigneeId::from("a"), -1.0);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn rejects_weights_whose_sum_overflows() {
        let draft: DistributionRuleDraft = serde_json::from_str(
            r#"{
                "name": "Heavy",
                "method": "weighted",
                "assignees": ["a", "b"],
                "weights": {"a": 1e308, "b": 1e308}
            }"#,
        )
        .expect("draft json");

        let error = draft.validate().expect_err("overflowing weights");
        assert!(error.to_string().contains("finite"), "{error}");
    }

    #[test]
    fn empty_conditions_match_every_lead() {
        let mut draft = draft();
        draft.conditions.clear();
        let rule = draft.into_rule(DistributionRuleId::generate(), Utc::now()).expect("valid");
        assert!(rule.matches(&Lead::new("L-1")));
    }

    #[test]
    fn method_parse_accepts_dashed_names() {
        assert_eq!(DistributionMethod::parse("load-balanced"), Some(DistributionMethod::LoadBalanced));
        assert_eq!(DistributionMethod::parse("fifo"), None);
    }
}
