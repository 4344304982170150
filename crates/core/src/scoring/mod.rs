//! Lead scoring: weighted rule evaluation and temperature classification.
//!
//! Every active rule is evaluated; priority only fixes the order in which
//! contributions appear in the breakdown. The total is recomputed from
//! scratch on each call so it always reflects the current rule set.

mod defaults;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::domain::lead::Lead;
use crate::domain::scoring::{LeadScore, ScoringRule, Temperature};

pub use defaults::{default_rules, DefaultScoringRule};

/// Sorts rules by descending priority; ties fall back to creation order, then id.
pub fn order_rules(rules: &mut [ScoringRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Clone, Debug, Default)]
pub struct ScoreEvaluator;

impl ScoreEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Scores `lead` against `rules`. Inactive rules are skipped; the caller's
    /// ordering is not trusted and is re-established here.
    pub fn evaluate(&self, lead: &Lead, rules: &[ScoringRule], now: DateTime<Utc>) -> LeadScore {
        let mut active: Vec<ScoringRule> =
            rules.iter().filter(|rule| rule.active).cloned().collect();
        order_rules(&mut active);

        let mut total_score: i32 = 0;
        let mut breakdown = IndexMap::new();

        for rule in active.iter().filter(|rule| rule.matches(lead)) {
            total_score = total_score.saturating_add(rule.points);
            breakdown.insert(rule.name.clone(), rule.points);
        }

        LeadScore {
            lead_id: lead.id.clone(),
            total_score,
            temperature: Temperature::from_score(total_score),
            breakdown,
            calculated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{order_rules, ScoreEvaluator};
    use crate::domain::lead::Lead;
    use crate::domain::scoring::{
        RuleCategory, ScoreCondition, ScoringRule, ScoringRuleId, Temperature,
    };

    fn rule(
        name: &str,
        priority: i32,
        points: i32,
        conditions: Vec<ScoreCondition>,
    ) -> ScoringRule {
        let now = Utc::now();
        ScoringRule {
            id: ScoringRuleId(format!("rule-{name}")),
            name: name.to_string(),
            description: None,
            category: RuleCategory::Custom,
            priority,
            points,
            active: true,
            conditions,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn referral_lead_with_email_scores_warm() {
        let rules = vec![
            rule("Email Provided", 10, 10, vec![ScoreCondition::HasEmail]),
            rule(
                "ReferralBoost",
                20,
                30,
                vec![ScoreCondition::SourceEquals("referral".to_string())],
            ),
        ];
        let lead = Lead::new("L-1").with_source("referral").with_email("a@b.com");

        let score = ScoreEvaluator::new().evaluate(&lead, &rules, Utc::now());

        assert_eq!(score.total_score, 40);
        assert_eq!(score.temperature, Temperature::Warm);
        assert_eq!(score.breakdown.get("ReferralBoost"), Some(&30));
        assert_eq!(score.breakdown.get("Email Provided"), Some(&10));
    }

    #[test]
    fn breakdown_follows_priority_order_and_skips_non_matching_rules() {
        let rules = vec![
            rule("Low", 1, 5, Vec::new()),
            rule("High", 50, 5, Vec::new()),
            rule("Phone", 40, 15, vec![ScoreCondition::HasPhone]),
        ];

        let score = ScoreEvaluator::new().evaluate(&Lead::new("L-1"), &rules, Utc::now());

        let names: Vec<&str> = score.breakdown.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["High", "Low"]);
        assert_eq!(score.total_score, 10);
    }

    #[test]
    fn negative_points_can_push_score_below_zero() {
        let rules = vec![rule("Disqualified", 0, -25, Vec::new())];
        let score = ScoreEvaluator::new().evaluate(&Lead::new("L-1"), &rules, Utc::now());

        assert_eq!(score.total_score, -25);
        assert_eq!(score.temperature, Temperature::Cold);
    }

    #[test]
    fn inactive_rules_never_contribute() {
        let mut disabled = rule("Disabled", 100, 90, Vec::new());
        disabled.active = false;

        let score = ScoreEvaluator::new().evaluate(&Lead::new("L-1"), &[disabled], Utc::now());
        assert_eq!(score.total_score, 0);
        assert!(score.breakdown.is_empty());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let rules = vec![
            rule("Email", 10, 10, vec![ScoreCondition::HasEmail]),
            rule("Company", 5, 20, vec![ScoreCondition::HasCompany]),
        ];
        let lead = Lead::new("L-1").with_email("x@y.z").with_company("C-1");
        let now = Utc::now();
        let evaluator = ScoreEvaluator::new();

        assert_eq!(evaluator.evaluate(&lead, &rules, now), evaluator.evaluate(&lead, &rules, now));
    }

    #[test]
    fn equal_priorities_keep_creation_order() {
        let mut older = rule("Older", 5, 1, Vec::new());
        let mut newer = rule("Newer", 5, 1, Vec::new());
        older.created_at = Utc::now() - Duration::minutes(5);
        newer.created_at = Utc::now();

        let mut rules = vec![newer, older];
        order_rules(&mut rules);
        assert_eq!(rules[0].name, "Older");
    }
}
