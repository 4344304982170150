use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use leadflow_core::domain::lead::LeadId;
use leadflow_core::domain::scoring::{
    LeadScore, ScoringRule, ScoringRuleDraft, ScoringRuleId, Temperature,
};
use leadflow_core::errors::ApplicationError;
use leadflow_core::events::{EventPublisher, LeadEvent, LeadEventKind};
use leadflow_core::scoring::{default_rules, DefaultScoringRule, ScoreEvaluator};
use leadflow_db::repositories::{LeadRepository, ScoringRuleRepository};

use crate::{persistence, publish};

const DEFAULT_HOT_LEADS_LIMIT: u32 = 10;
const MAX_HOT_LEADS_LIMIT: u32 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCalculateRequest {
    /// Every lead in the store when absent.
    #[serde(default)]
    pub lead_ids: Option<Vec<LeadId>>,
    /// Accepted for compatibility; scores are always recalculated.
    #[serde(default)]
    pub force_recalculate: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkScoreItem {
    pub lead_id: LeadId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkScoreItem {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkScoreReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkScoreItem>,
}

pub struct ScoringService {
    leads: Arc<dyn LeadRepository>,
    rules: Arc<dyn ScoringRuleRepository>,
    publisher: Arc<dyn EventPublisher>,
    evaluator: ScoreEvaluator,
    hot_leads_default_limit: u32,
    hot_leads_max_limit: u32,
}

impl ScoringService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        rules: Arc<dyn ScoringRuleRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            leads,
            rules,
            publisher,
            evaluator: ScoreEvaluator::new(),
            hot_leads_default_limit: DEFAULT_HOT_LEADS_LIMIT,
            hot_leads_max_limit: MAX_HOT_LEADS_LIMIT,
        }
    }

    pub fn with_hot_lead_limits(mut self, default_limit: u32, max_limit: u32) -> Self {
        self.hot_leads_max_limit = max_limit.max(1);
        self.hot_leads_default_limit = default_limit.clamp(1, self.hot_leads_max_limit);
        self
    }

    pub async fn get_rules(&self) -> Result<Vec<ScoringRule>, ApplicationError> {
        self.rules.list(false).await.map_err(persistence)
    }

    pub async fn get_rule(&self, id: &ScoringRuleId) -> Result<ScoringRule, ApplicationError> {
        self.rules
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::ScoringRuleNotFound(id.clone()))
    }

    pub async fn create_rule(
        &self,
        draft: ScoringRuleDraft,
    ) -> Result<ScoringRule, ApplicationError> {
        let rule = draft.into_rule(ScoringRuleId::generate(), Utc::now())?;
        self.rules.save(rule.clone()).await.map_err(persistence)?;
        info!(
            event_name = "scoring.rule_created",
            rule_id = %rule.id,
            points = rule.points,
            priority = rule.priority,
            "scoring rule created"
        );
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: &ScoringRuleId,
        draft: ScoringRuleDraft,
    ) -> Result<ScoringRule, ApplicationError> {
        let mut rule = self.get_rule(id).await?;
        draft.apply_to(&mut rule, Utc::now())?;
        self.rules.save(rule.clone()).await.map_err(persistence)?;
        Ok(rule)
    }

    /// `false` when the rule was already gone.
    pub async fn delete_rule(&self, id: &ScoringRuleId) -> Result<bool, ApplicationError> {
        self.rules.delete(id).await.map_err(persistence)
    }

    pub async fn toggle_rule(&self, id: &ScoringRuleId) -> Result<ScoringRule, ApplicationError> {
        let rule = self
            .rules
            .toggle_active(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::ScoringRuleNotFound(id.clone()))?;
        info!(
            event_name = "scoring.rule_toggled",
            rule_id = %rule.id,
            active = rule.active,
            "scoring rule toggled"
        );
        Ok(rule)
    }

    /// Recomputes the lead's score from every active rule and overwrites the
    /// stored score, temperature and breakdown.
    pub async fn calculate_score(
        &self,
        lead_id: &LeadId,
        correlation_id: &str,
    ) -> Result<LeadScore, ApplicationError> {
        let rules = self.rules.list(true).await.map_err(persistence)?;
        self.score_with(lead_id, &rules, correlation_id).await
    }

    /// Scores each lead independently; one lead's failure is recorded in its
    /// slot and the batch carries on.
    pub async fn bulk_calculate(
        &self,
        request: BulkCalculateRequest,
        correlation_id: &str,
    ) -> Result<BulkScoreReport, ApplicationError> {
        let lead_ids = match request.lead_ids {
            Some(ids) => ids,
            None => self.leads.list_ids().await.map_err(persistence)?,
        };
        let rules = self.rules.list(true).await.map_err(persistence)?;

        let mut results = Vec::with_capacity(lead_ids.len());
        for lead_id in lead_ids {
            let item = match self.score_with(&lead_id, &rules, correlation_id).await {
                Ok(score) => BulkScoreItem {
                    lead_id,
                    total_score: Some(score.total_score),
                    temperature: Some(score.temperature),
                    error_class: None,
                    error: None,
                },
                Err(error) => {
                    warn!(
                        event_name = "scoring.bulk_item_failed",
                        correlation_id = %correlation_id,
                        lead_id = %lead_id,
                        error_class = error.class(),
                        error = %error,
                        "bulk score item failed"
                    );
                    BulkScoreItem {
                        lead_id,
                        total_score: None,
                        temperature: None,
                        error_class: Some(error.class()),
                        error: Some(error.to_string()),
                    }
                }
            };
            results.push(item);
        }

        let succeeded = results.iter().filter(|item| item.succeeded()).count();
        Ok(BulkScoreReport {
            processed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        })
    }

    pub async fn get_score(&self, lead_id: &LeadId) -> Result<LeadScore, ApplicationError> {
        self.leads
            .find_score(lead_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::ScoreNotFound(lead_id.clone()))
    }

    /// Hot scores, highest first. `None` uses the configured default limit;
    /// larger requests are capped at the configured maximum.
    pub async fn get_hot_leads(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<LeadScore>, ApplicationError> {
        let limit =
            limit.unwrap_or(self.hot_leads_default_limit).clamp(1, self.hot_leads_max_limit);
        self.leads.hot_scores(limit).await.map_err(persistence)
    }

    pub fn default_rules(&self) -> Vec<DefaultScoringRule> {
        default_rules()
    }

    async fn score_with(
        &self,
        lead_id: &LeadId,
        rules: &[ScoringRule],
        correlation_id: &str,
    ) -> Result<LeadScore, ApplicationError> {
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::LeadNotFound(lead_id.clone()))?;

        let score = self.evaluator.evaluate(&lead, rules, Utc::now());
        let stored = self.leads.save_score(score.clone()).await.map_err(persistence)?;
        if !stored {
            return Err(ApplicationError::LeadNotFound(lead_id.clone()));
        }

        info!(
            event_name = "scoring.lead_scored",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            total_score = score.total_score,
            temperature = score.temperature.as_str(),
            matched_rules = score.breakdown.len(),
            "lead scored"
        );
        publish(
            self.publisher.as_ref(),
            LeadEvent::new(LeadEventKind::Scored, lead_id.clone(), correlation_id)
                .with_metadata("total_score", score.total_score.to_string())
                .with_metadata("temperature", score.temperature.as_str()),
        );

        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadflow_core::domain::lead::{Lead, LeadId};
    use leadflow_core::domain::scoring::{RuleCategory, ScoreCondition, ScoringRuleDraft};
    use leadflow_core::errors::ApplicationError;
    use leadflow_core::events::NoopPublisher;
    use leadflow_db::repositories::{
        InMemoryLeadRepository, InMemoryScoringRuleRepository, LeadRepository,
    };

    use super::ScoringService;

    fn service() -> (ScoringService, Arc<InMemoryLeadRepository>) {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let service = ScoringService::new(
            leads.clone(),
            Arc::new(InMemoryScoringRuleRepository::default()),
            Arc::new(NoopPublisher),
        );
        (service, leads)
    }

    fn draft(name: &str, points: i32) -> ScoringRuleDraft {
        ScoringRuleDraft {
            name: name.to_string(),
            description: None,
            category: RuleCategory::Custom,
            priority: 0,
            points,
            active: true,
            conditions: vec![ScoreCondition::HasEmail],
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let (service, _) = service();
        let error = service.create_rule(draft("  ", 10)).await.expect_err("blank name");
        assert_eq!(error.class(), "validation");
    }

    #[tokio::test]
    async fn update_replaces_rule_fields() {
        let (service, _) = service();
        let rule = service.create_rule(draft("Email", 10)).await.expect("create");

        let updated = service.update_rule(&rule.id, draft("Email v2", 12)).await.expect("update");

        assert_eq!(updated.id, rule.id);
        assert_eq!(updated.name, "Email v2");
        assert_eq!(updated.points, 12);
        assert_eq!(updated.created_at, rule.created_at);
    }

    #[tokio::test]
    async fn score_reflects_rule_changes_on_recalculation() {
        let (service, leads) = service();
        leads.save(Lead::new("lead-1").with_email("a@b.com")).await.expect("save");
        let lead_id = LeadId("lead-1".to_string());
        let rule = service.create_rule(draft("Email", 10)).await.expect("create");

        let first = service.calculate_score(&lead_id, "test").await.expect("score");
        assert_eq!(first.total_score, 10);

        service.toggle_rule(&rule.id).await.expect("toggle");
        let second = service.calculate_score(&lead_id, "test").await.expect("score");
        assert_eq!(second.total_score, 0);
        assert!(second.breakdown.is_empty());

        let stored = service.get_score(&lead_id).await.expect("stored");
        assert_eq!(stored.total_score, 0);
    }

    #[tokio::test]
    async fn missing_lead_and_missing_score_are_not_found() {
        let (service, leads) = service();
        let ghost = LeadId("ghost".to_string());
        let error = service.calculate_score(&ghost, "test").await.expect_err("missing lead");
        assert_eq!(error, ApplicationError::LeadNotFound(ghost.clone()));

        leads.save(Lead::new("unscored")).await.expect("save");
        let error =
            service.get_score(&LeadId("unscored".to_string())).await.expect_err("no score yet");
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn hot_lead_limit_is_clamped() {
        let (service, leads) = service();
        let service = service.with_hot_lead_limits(2, 3);
        service
            .create_rule(ScoringRuleDraft { conditions: Vec::new(), ..draft("Base", 80) })
            .await
            .expect("create");
        for index in 0..5 {
            let id = format!("lead-{index}");
            leads.save(Lead::new(id.clone())).await.expect("save");
            service.calculate_score(&LeadId(id), "test").await.expect("score");
        }

        assert_eq!(service.get_hot_leads(None).await.expect("default").len(), 2);
        assert_eq!(service.get_hot_leads(Some(50)).await.expect("capped").len(), 3);
        assert_eq!(service.get_hot_leads(Some(0)).await.expect("floor").len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_rule_existed() {
        let (service, _) = service();
        let rule = service.create_rule(draft("Email", 10)).await.expect("create");

        assert!(service.delete_rule(&rule.id).await.expect("delete"));
        assert!(!service.delete_rule(&rule.id).await.expect("delete again"));
        let error = service.get_rule(&rule.id).await.expect_err("gone");
        assert!(error.is_not_found());
    }
}
