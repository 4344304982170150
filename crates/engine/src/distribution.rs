use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use leadflow_core::distribution::{plan_route, AssignmentSelector, RouteDecision};
use leadflow_core::domain::distribution::{
    AssignmentOrigin, AssignmentRecord, DistributionMethod, DistributionRule,
    DistributionRuleDraft, DistributionRuleId,
};
use leadflow_core::domain::lead::{AssigneeId, LeadId};
use leadflow_core::errors::{ApplicationError, DomainError};
use leadflow_core::events::{EventPublisher, LeadEvent, LeadEventKind};
use leadflow_core::workload::WorkloadEntry;
use leadflow_db::repositories::{DistributionRuleRepository, LeadRepository};

use crate::workload::WorkloadTracker;
use crate::{persistence, publish};

/// Result of a direct assignee overwrite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub lead_id: LeadId,
    pub previous_assignee: Option<AssigneeId>,
    pub assignee: AssigneeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkAssignItem {
    pub lead_id: LeadId,
    pub success: bool,
    pub previous_assignee: Option<AssigneeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkAssignReport {
    pub assignee: AssigneeId,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkAssignItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionStats {
    pub total_leads: u64,
    pub assigned_leads: u64,
    pub unassigned_leads: u64,
    pub active_rules: usize,
    pub workload: Vec<WorkloadEntry>,
}

pub struct DistributionService {
    leads: Arc<dyn LeadRepository>,
    rules: Arc<dyn DistributionRuleRepository>,
    selector: AssignmentSelector,
    workload: WorkloadTracker,
    publisher: Arc<dyn EventPublisher>,
}

impl DistributionService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        rules: Arc<dyn DistributionRuleRepository>,
        selector: AssignmentSelector,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let workload = WorkloadTracker::new(leads.clone());
        Self { leads, rules, selector, workload, publisher }
    }

    pub async fn get_rules(&self) -> Result<Vec<DistributionRule>, ApplicationError> {
        self.rules.list(false).await.map_err(persistence)
    }

    pub async fn get_rule(
        &self,
        id: &DistributionRuleId,
    ) -> Result<DistributionRule, ApplicationError> {
        self.rules
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::DistributionRuleNotFound(id.clone()))
    }

    pub async fn create_rule(
        &self,
        draft: DistributionRuleDraft,
    ) -> Result<DistributionRule, ApplicationError> {
        let rule = draft.into_rule(DistributionRuleId::generate(), Utc::now())?;
        self.rules.save(rule.clone()).await.map_err(persistence)?;
        info!(
            event_name = "distribution.rule_created",
            rule_id = %rule.id,
            method = rule.method.as_str(),
            pool_size = rule.assignees.len(),
            "distribution rule created"
        );
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: &DistributionRuleId,
        draft: DistributionRuleDraft,
    ) -> Result<DistributionRule, ApplicationError> {
        let mut rule = self.get_rule(id).await?;
        draft.apply_to(&mut rule, Utc::now())?;
        self.rules.save(rule.clone()).await.map_err(persistence)?;
        Ok(rule)
    }

    /// `false` when the rule was already gone.
    pub async fn delete_rule(&self, id: &DistributionRuleId) -> Result<bool, ApplicationError> {
        self.rules.delete(id).await.map_err(persistence)
    }

    pub async fn toggle_rule(
        &self,
        id: &DistributionRuleId,
    ) -> Result<DistributionRule, ApplicationError> {
        let rule = self
            .rules
            .toggle_active(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::DistributionRuleNotFound(id.clone()))?;
        info!(
            event_name = "distribution.rule_toggled",
            rule_id = %rule.id,
            active = rule.active,
            "distribution rule toggled"
        );
        Ok(rule)
    }

    /// Routes the lead through the active rules.
    ///
    /// Matching rules are tried in priority order and the first one whose pool
    /// yields an assignee wins. When none does, the highest-priority active
    /// rule is tried regardless of its conditions. If that also yields nobody
    /// the lead is left untouched and `NoRulesConfigured` is returned.
    pub async fn auto_assign(
        &self,
        lead_id: &LeadId,
        correlation_id: &str,
    ) -> Result<RouteDecision, ApplicationError> {
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::LeadNotFound(lead_id.clone()))?;
        let rules = self.rules.list(true).await.map_err(persistence)?;

        for candidate in plan_route(&lead, &rules) {
            let workloads = if candidate.rule.method == DistributionMethod::LoadBalanced {
                Some(self.workload.snapshot().await?)
            } else {
                None
            };

            let Some(assignee) = self.selector.select(candidate.rule, workloads.as_ref())? else {
                debug!(
                    event_name = "distribution.rule_skipped",
                    correlation_id = %correlation_id,
                    lead_id = %lead_id,
                    rule_id = %candidate.rule.id,
                    "rule pool yielded no assignee"
                );
                continue;
            };

            let origin = AssignmentOrigin::Rule {
                rule_id: candidate.rule.id.clone(),
                method: candidate.rule.method,
            };
            let record = self
                .write_assignment(lead_id, assignee.clone(), origin, correlation_id)
                .await?;
            let decision = RouteDecision::new(&candidate, assignee);

            info!(
                event_name = "distribution.lead_assigned",
                correlation_id = %correlation_id,
                lead_id = %lead_id,
                rule_id = %decision.rule_id,
                method = decision.method.as_str(),
                assignee_id = %decision.assignee,
                previous_assignee = ?record.previous_assignee,
                "lead assigned"
            );
            return Ok(decision);
        }

        warn!(
            event_name = "distribution.no_rule_available",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            active_rules = rules.len(),
            "no distribution rule produced an assignee"
        );
        Err(ApplicationError::NoRulesConfigured(lead_id.clone()))
    }

    /// Overwrites the assignee without consulting any rule.
    pub async fn reassign(
        &self,
        lead_id: &LeadId,
        assignee: AssigneeId,
        reason: Option<String>,
        correlation_id: &str,
    ) -> Result<AssignmentOutcome, ApplicationError> {
        ensure_assignee(&assignee)?;
        let origin = AssignmentOrigin::Manual { reason: reason.clone() };
        let record =
            self.write_assignment(lead_id, assignee.clone(), origin, correlation_id).await?;

        info!(
            event_name = "distribution.lead_reassigned",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            assignee_id = %assignee,
            previous_assignee = ?record.previous_assignee,
            "lead reassigned"
        );
        Ok(AssignmentOutcome {
            lead_id: lead_id.clone(),
            previous_assignee: record.previous_assignee,
            assignee,
            reason,
        })
    }

    /// Assigns every lead to `assignee`; one lead's failure is recorded in its
    /// slot and the batch carries on.
    pub async fn bulk_assign(
        &self,
        lead_ids: Vec<LeadId>,
        assignee: AssigneeId,
        correlation_id: &str,
    ) -> Result<BulkAssignReport, ApplicationError> {
        ensure_assignee(&assignee)?;

        let mut results = Vec::with_capacity(lead_ids.len());
        for lead_id in lead_ids {
            let origin = AssignmentOrigin::Bulk;
            let outcome =
                self.write_assignment(&lead_id, assignee.clone(), origin, correlation_id).await;
            let item = match outcome {
                Ok(record) => BulkAssignItem {
                    lead_id,
                    success: true,
                    previous_assignee: record.previous_assignee,
                    error_class: None,
                    error: None,
                },
                Err(error) => {
                    warn!(
                        event_name = "distribution.bulk_item_failed",
                        correlation_id = %correlation_id,
                        lead_id = %lead_id,
                        error_class = error.class(),
                        error = %error,
                        "bulk assignment item failed"
                    );
                    BulkAssignItem {
                        lead_id,
                        success: false,
                        previous_assignee: None,
                        error_class: Some(error.class()),
                        error: Some(error.to_string()),
                    }
                }
            };
            results.push(item);
        }

        let succeeded = results.iter().filter(|item| item.success).count();
        info!(
            event_name = "distribution.bulk_assigned",
            correlation_id = %correlation_id,
            assignee_id = %assignee,
            processed = results.len(),
            succeeded,
            "bulk assignment finished"
        );
        Ok(BulkAssignReport {
            assignee,
            processed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        })
    }

    pub async fn get_workload(&self) -> Result<Vec<WorkloadEntry>, ApplicationError> {
        self.workload.entries().await
    }

    pub async fn get_stats(&self) -> Result<DistributionStats, ApplicationError> {
        let counts = self.leads.counts().await.map_err(persistence)?;
        let active_rules = self.rules.list(true).await.map_err(persistence)?.len();
        let workload = self.workload.entries().await?;

        Ok(DistributionStats {
            total_leads: counts.total,
            assigned_leads: counts.assigned,
            unassigned_leads: counts.total.saturating_sub(counts.assigned),
            active_rules,
            workload,
        })
    }

    /// Writes the assignee and its history row together, then announces it.
    async fn write_assignment(
        &self,
        lead_id: &LeadId,
        assignee: AssigneeId,
        origin: AssignmentOrigin,
        correlation_id: &str,
    ) -> Result<AssignmentRecord, ApplicationError> {
        let record = AssignmentRecord::new(lead_id.clone(), assignee, origin);
        let stored = self
            .leads
            .assign(record)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::LeadNotFound(lead_id.clone()))?;

        let mut event = LeadEvent::new(LeadEventKind::Assigned, lead_id.clone(), correlation_id)
            .with_metadata("assignee_id", stored.assignee.0.clone());
        if let Some(previous) = &stored.previous_assignee {
            event = event.with_metadata("previous_assignee", previous.0.clone());
        }
        match &stored.origin {
            AssignmentOrigin::Rule { rule_id, method } => {
                event = event
                    .with_metadata("rule_id", rule_id.0.clone())
                    .with_metadata("method", method.as_str());
            }
            AssignmentOrigin::Manual { reason } => {
                event = event.with_metadata("origin", "manual");
                if let Some(reason) = reason {
                    event = event.with_metadata("reason", reason.clone());
                }
            }
            AssignmentOrigin::Bulk => event = event.with_metadata("origin", "bulk"),
        }
        publish(self.publisher.as_ref(), event);

        Ok(stored)
    }
}

fn ensure_assignee(assignee: &AssigneeId) -> Result<(), ApplicationError> {
    if assignee.0.trim().is_empty() {
        return Err(DomainError::Validation("assignee id must not be empty".to_string()).into());
    }
    Ok(())
}
