use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;

use leadflow_core::distribution::order_rules as order_distribution_rules;
use leadflow_core::domain::distribution::{AssignmentRecord, DistributionRule, DistributionRuleId};
use leadflow_core::domain::lead::{AssigneeId, Lead, LeadId};
use leadflow_core::domain::scoring::{LeadScore, ScoringRule, ScoringRuleId, Temperature};
use leadflow_core::scoring::order_rules as order_scoring_rules;

use super::{
    DistributionRuleRepository, LeadCounts, LeadRepository, RepositoryError,
    ScoringRuleRepository,
};

#[derive(Default)]
struct LeadState {
    leads: HashMap<String, Lead>,
    scores: HashMap<String, LeadScore>,
    history: Vec<AssignmentRecord>,
}

/// Lead store backed by one lock so assignee writes and their history rows
/// land together.
#[derive(Default)]
pub struct InMemoryLeadRepository {
    state: RwLock<LeadState>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.leads.get(&id.0).cloned())
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<LeadId>, RepositoryError> {
        let state = self.state.read().await;
        let mut leads: Vec<&Lead> = state.leads.values().collect();
        leads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(leads.into_iter().map(|lead| lead.id.clone()).collect())
    }

    async fn counts(&self) -> Result<LeadCounts, RepositoryError> {
        let state = self.state.read().await;
        let assigned = state.leads.values().filter(|lead| lead.assigned_to.is_some()).count();
        Ok(LeadCounts { total: state.leads.len() as u64, assigned: assigned as u64 })
    }

    async fn assign(
        &self,
        record: AssignmentRecord,
    ) -> Result<Option<AssignmentRecord>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(lead) = state.leads.get_mut(&record.lead_id.0) else {
            return Ok(None);
        };

        let previous = lead.assigned_to.replace(record.assignee.clone());
        lead.updated_at = record.assigned_at;

        let stored = AssignmentRecord { previous_assignee: previous, ..record };
        state.history.push(stored.clone());
        Ok(Some(stored))
    }

    async fn assignment_history(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.history.iter().filter(|record| &record.lead_id == lead_id).cloned().collect())
    }

    async fn assignment_counts(&self) -> Result<Vec<(AssigneeId, u64)>, RepositoryError> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<AssigneeId, u64> = BTreeMap::new();
        for assignee in state.leads.values().filter_map(|lead| lead.assigned_to.as_ref()) {
            *counts.entry(assignee.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn save_score(&self, score: LeadScore) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(lead) = state.leads.get_mut(&score.lead_id.0) else {
            return Ok(false);
        };

        lead.score = score.total_score;
        lead.temperature = Some(score.temperature);
        lead.updated_at = score.calculated_at;
        state.scores.insert(score.lead_id.0.clone(), score);
        Ok(true)
    }

    async fn find_score(&self, lead_id: &LeadId) -> Result<Option<LeadScore>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.scores.get(&lead_id.0).cloned())
    }

    async fn hot_scores(&self, limit: u32) -> Result<Vec<LeadScore>, RepositoryError> {
        let state = self.state.read().await;
        let mut hot: Vec<LeadScore> = state
            .scores
            .values()
            .filter(|score| score.temperature == Temperature::Hot)
            .cloned()
            .collect();
        hot.sort_by(|a, b| {
            b.total_score.cmp(&a.total_score).then_with(|| b.calculated_at.cmp(&a.calculated_at))
        });
        hot.truncate(limit as usize);
        Ok(hot)
    }
}

#[derive(Default)]
pub struct InMemoryScoringRuleRepository {
    rules: RwLock<HashMap<String, ScoringRule>>,
}

#[async_trait::async_trait]
impl ScoringRuleRepository for InMemoryScoringRuleRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<ScoringRule>, RepositoryError> {
        let rules = self.rules.read().await;
        let mut listed: Vec<ScoringRule> =
            rules.values().filter(|rule| !active_only || rule.active).cloned().collect();
        order_scoring_rules(&mut listed);
        Ok(listed)
    }

    async fn find_by_id(
        &self,
        id: &ScoringRuleId,
    ) -> Result<Option<ScoringRule>, RepositoryError> {
        let rules = self.rules.read().await;
        Ok(rules.get(&id.0).cloned())
    }

    async fn save(&self, rule: ScoringRule) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id.0.clone(), rule);
        Ok(())
    }

    async fn delete(&self, id: &ScoringRuleId) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        Ok(rules.remove(&id.0).is_some())
    }

    async fn toggle_active(
        &self,
        id: &ScoringRuleId,
    ) -> Result<Option<ScoringRule>, RepositoryError> {
        let mut rules = self.rules.write().await;
        Ok(rules.get_mut(&id.0).map(|rule| {
            rule.active = !rule.active;
            rule.updated_at = Utc::now();
            rule.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemoryDistributionRuleRepository {
    rules: RwLock<HashMap<String, DistributionRule>>,
}

#[async_trait::async_trait]
impl DistributionRuleRepository for InMemoryDistributionRuleRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<DistributionRule>, RepositoryError> {
        let rules = self.rules.read().await;
        let mut listed: Vec<DistributionRule> =
            rules.values().filter(|rule| !active_only || rule.active).cloned().collect();
        order_distribution_rules(&mut listed);
        Ok(listed)
    }

    async fn find_by_id(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError> {
        let rules = self.rules.read().await;
        Ok(rules.get(&id.0).cloned())
    }

    async fn save(&self, rule: DistributionRule) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id.0.clone(), rule);
        Ok(())
    }

    async fn delete(&self, id: &DistributionRuleId) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        Ok(rules.remove(&id.0).is_some())
    }

    async fn toggle_active(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError> {
        let mut rules = self.rules.write().await;
        Ok(rules.get_mut(&id.0).map(|rule| {
            rule.active = !rule.active;
            rule.updated_at = Utc::now();
            rule.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use leadflow_core::domain::distribution::{AssignmentOrigin, AssignmentRecord};
    use leadflow_core::domain::lead::{AssigneeId, Lead, LeadId};
    use leadflow_core::scoring::default_rules;

    use super::{InMemoryLeadRepository, InMemoryScoringRuleRepository};
    use crate::repositories::{LeadCounts, LeadRepository, ScoringRuleRepository};

    #[tokio::test]
    async fn in_memory_assign_tracks_previous_assignee() {
        let repo = InMemoryLeadRepository::default();
        repo.save(Lead::new("lead-1")).await.expect("save");
        let lead_id = LeadId("lead-1".to_string());

        repo.assign(AssignmentRecord::new(
            lead_id.clone(),
            AssigneeId::from("agent-7"),
            AssignmentOrigin::Bulk,
        ))
        .await
        .expect("assign");
        let second = repo
            .assign(AssignmentRecord::new(
                lead_id.clone(),
                AssigneeId::from("agent-9"),
                AssignmentOrigin::Manual { reason: None },
            ))
            .await
            .expect("assign")
            .expect("lead exists");

        assert_eq!(second.previous_assignee, Some(AssigneeId::from("agent-7")));
        assert_eq!(repo.assignment_history(&lead_id).await.expect("history").len(), 2);
        assert_eq!(repo.counts().await.expect("counts"), LeadCounts { total: 1, assigned: 1 });
        assert_eq!(
            repo.assignment_counts().await.expect("counts"),
            vec![(AssigneeId::from("agent-9"), 1)]
        );
    }

    #[tokio::test]
    async fn in_memory_assign_unknown_lead_is_none() {
        let repo = InMemoryLeadRepository::default();
        let result = repo
            .assign(AssignmentRecord::new(
                LeadId("ghost".to_string()),
                AssigneeId::from("agent-7"),
                AssignmentOrigin::Bulk,
            ))
            .await
            .expect("assign");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn in_memory_scoring_rules_list_in_priority_order() {
        let repo = InMemoryScoringRuleRepository::default();
        let now = Utc::now();
        for rule in default_rules().iter().map(|d| d.to_rule(now)) {
            repo.save(rule).await.expect("save");
        }

        let listed = repo.list(false).await.expect("list");
        assert_eq!(listed[0].name, "Referral Source");
        assert!(listed.windows(2).all(|pair| pair[0].priority >= pair[1].priority));

        let target = listed[0].id.clone();
        let toggled = repo.toggle_active(&target).await.expect("toggle").expect("exists");
        assert!(!toggled.active);
        assert_eq!(repo.list(true).await.expect("active").len(), listed.len() - 1);
    }
}
