use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::scoring::{
    RuleCategory, ScoreCondition, ScoringRule, ScoringRuleDraft, ScoringRuleId,
};

/// Seed entry used to bootstrap an empty scoring rule store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DefaultScoringRule {
    pub name: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub priority: i32,
    pub points: i32,
    pub conditions: Vec<ScoreCondition>,
}

impl DefaultScoringRule {
    pub fn to_draft(&self) -> ScoringRuleDraft {
        ScoringRuleDraft {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            category: self.category,
            priority: self.priority,
            points: self.points,
            active: true,
            conditions: self.conditions.clone(),
        }
    }

    pub fn to_rule(&self, now: DateTime<Utc>) -> ScoringRule {
        ScoringRule {
            id: ScoringRuleId::generate(),
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            category: self.category,
            priority: self.priority,
            points: self.points,
            active: true,
            conditions: self.conditions.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn default_rules() -> Vec<DefaultScoringRule> {
    vec![
        DefaultScoringRule {
            name: "Email Provided",
            description: "Lead has supplied an email address",
            category: RuleCategory::Demographic,
            priority: 10,
            points: 10,
            conditions: vec![ScoreCondition::HasEmail],
        },
        DefaultScoringRule {
            name: "Phone Provided",
            description: "Lead has supplied a phone number",
            category: RuleCategory::Demographic,
            priority: 10,
            points: 15,
            conditions: vec![ScoreCondition::HasPhone],
        },
        DefaultScoringRule {
            name: "Company Provided",
            description: "Lead is linked to a company",
            category: RuleCategory::Firmographic,
            priority: 10,
            points: 20,
            conditions: vec![ScoreCondition::HasCompany],
        },
        DefaultScoringRule {
            name: "Website Visit",
            description: "Lead has visited the website",
            category: RuleCategory::Behavioral,
            priority: 5,
            points: 5,
            conditions: vec![ScoreCondition::VisitedWebsite],
        },
        DefaultScoringRule {
            name: "Form Submission",
            description: "Lead has submitted a form",
            category: RuleCategory::Engagement,
            priority: 5,
            points: 25,
            conditions: vec![ScoreCondition::SubmittedForm],
        },
        DefaultScoringRule {
            name: "Email Opened",
            description: "Lead has opened a marketing email",
            category: RuleCategory::Engagement,
            priority: 5,
            points: 10,
            conditions: vec![ScoreCondition::OpenedEmail],
        },
        DefaultScoringRule {
            name: "Referral Source",
            description: "Lead arrived through a referral",
            category: RuleCategory::Custom,
            priority: 20,
            points: 30,
            conditions: vec![ScoreCondition::SourceEquals("referral".to_string())],
        },
    ]
}
