use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::{Lead, LeadId};
use crate::errors::DomainError;

pub const HOT_THRESHOLD: i32 = 70;
pub const WARM_THRESHOLD: i32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoringRuleId(pub String);

impl ScoringRuleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ScoringRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Demographic,
    Behavioral,
    Engagement,
    Firmographic,
    Custom,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demographic => "demographic",
            Self::Behavioral => "behavioral",
            Self::Engagement => "engagement",
            Self::Firmographic => "firmographic",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "demographic" => Some(Self::Demographic),
            "behavioral" => Some(Self::Behavioral),
            "engagement" => Some(Self::Engagement),
            "firmographic" => Some(Self::Firmographic),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Closed set of predicates a scoring rule can place on a lead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScoreCondition {
    HasEmail,
    HasPhone,
    HasCompany,
    SourceEquals(String),
    VisitedWebsite,
    SubmittedForm,
    OpenedEmail,
}

impl ScoreCondition {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            Self::HasEmail => lead.has_email(),
            Self::HasPhone => lead.has_phone(),
            Self::HasCompany => lead.has_company(),
            Self::SourceEquals(expected) => lead.source.as_deref() == Some(expected.as_str()),
            Self::VisitedWebsite => lead.engagement.website_visits > 0,
            Self::SubmittedForm => lead.engagement.form_submissions > 0,
            Self::OpenedEmail => lead.engagement.emails_opened > 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub id: ScoringRuleId,
    pub name: String,
    pub description: Option<String>,
    pub category: RuleCategory,
    pub priority: i32,
    pub points: i32,
    pub active: bool,
    pub conditions: Vec<ScoreCondition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoringRule {
    /// Every condition must hold; an empty set always matches.
    pub fn matches(&self, lead: &Lead) -> bool {
        self.conditions.iter().all(|condition| condition.matches(lead))
    }
}

/// Operator-supplied fields for creating or replacing a scoring rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_category")]
    pub category: RuleCategory,
    #[serde(default)]
    pub priority: i32,
    pub points: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: Vec<ScoreCondition>,
}

fn default_category() -> RuleCategory {
    RuleCategory::Custom
}

fn default_active() -> bool {
    true
}

impl ScoringRuleDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("scoring rule name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn into_rule(
        self,
        id: ScoringRuleId,
        now: DateTime<Utc>,
    ) -> Result<ScoringRule, DomainError> {
        self.validate()?;
        Ok(ScoringRule {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            category: self.category,
            priority: self.priority,
            points: self.points,
            active: self.active,
            conditions: self.conditions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the mutable fields of `rule`, keeping identity and creation time.
    pub fn apply_to(self, rule: &mut ScoringRule, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.validate()?;
        rule.name = self.name.trim().to_string();
        rule.description = self.description;
        rule.category = self.category;
        rule.priority = self.priority;
        rule.points = self.points;
        rule.active = self.active;
        rule.conditions = self.conditions;
        rule.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Cold,
    Warm,
    Hot,
}

impl Temperature {
    pub fn from_score(score: i32) -> Self {
        if score >= HOT_THRESHOLD {
            Self::Hot
        } else if score >= WARM_THRESHOLD {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cold" => Some(Self::Cold),
            "warm" => Some(Self::Warm),
            "hot" => Some(Self::Hot),
            _ => None,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived score record, one per lead, replaced wholesale on every calculation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScore {
    pub lead_id: LeadId,
    pub total_score: i32,
    pub temperature: Temperature,
    /// Rule name to points, in rule evaluation order.
    pub breakdown: IndexMap<String, i32>,
    pub calculated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{RuleCategory, ScoreCondition, ScoringRuleDraft, ScoringRuleId, Temperature};
    use crate::domain::lead::Lead;

    #[test]
    fn temperature_boundaries_are_inclusive_at_lower_edge() {
        assert_eq!(Temperature::from_score(70), Temperature::Hot);
        assert_eq!(Temperature::from_score(69), Temperature::Warm);
        assert_eq!(Temperature::from_score(30), Temperature::Warm);
        assert_eq!(Temperature::from_score(29), Temperature::Cold);
        assert_eq!(Temperature::from_score(-15), Temperature::Cold);
    }

    #[test]
    fn source_condition_requires_exact_match() {
        let lead = Lead::new("L-1").with_source("Referral");
        assert!(!ScoreCondition::SourceEquals("referral".to_string()).matches(&lead));
        assert!(ScoreCondition::SourceEquals("Referral".to_string()).matches(&lead));
        assert!(!ScoreCondition::SourceEquals("referral".to_string()).matches(&Lead::new("L-2")));
    }

    #[test]
    fn engagement_conditions_need_a_recorded_signal() {
        let mut lead = Lead::new("L-1");
        assert!(!ScoreCondition::VisitedWebsite.matches(&lead));
        lead.engagement.website_visits = 2;
        assert!(ScoreCondition::VisitedWebsite.matches(&lead));
        assert!(!ScoreCondition::SubmittedForm.matches(&lead));
    }

    #[test]
    fn condition_serializes_as_tagged_variant() {
        let json = serde_json::to_value(ScoreCondition::SourceEquals("referral".to_string()))
            .expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "source_equals", "value": "referral"}));

        let parsed: ScoreCondition =
            serde_json::from_value(serde_json::json!({"kind": "has_email"})).expect("deserialize");
        assert_eq!(parsed, ScoreCondition::HasEmail);
    }

    #[test]
    fn draft_with_blank_name_is_rejected() {
        let draft = ScoringRuleDraft {
            name: "  ".to_string(),
            description: None,
            category: RuleCategory::Custom,
            priority: 0,
            points: 5,
            active: true,
            conditions: Vec::new(),
        };

        assert!(draft.into_rule(ScoringRuleId::generate(), Utc::now()).is_err());
    }
}
