use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use leadflow_core::domain::distribution::{
    AssignmentRecord, DistributionRule, DistributionRuleId,
};
use leadflow_core::domain::lead::{AssigneeId, Lead, LeadId};
use leadflow_core::domain::scoring::{LeadScore, ScoringRule, ScoringRuleId};

pub mod distribution_rule;
pub mod lead;
pub mod memory;
pub mod scoring_rule;

pub use distribution_rule::SqlDistributionRuleRepository;
pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryDistributionRuleRepository, InMemoryLeadRepository, InMemoryScoringRuleRepository,
};
pub use scoring_rule::SqlScoringRuleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LeadCounts {
    pub total: u64,
    pub assigned: u64,
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
    async fn list_ids(&self) -> Result<Vec<LeadId>, RepositoryError>;
    async fn counts(&self) -> Result<LeadCounts, RepositoryError>;

    /// Sets the lead's assignee and appends `record` in one write. Returns the
    /// stored record with `previous_assignee` filled in, or `None` when the
    /// lead does not exist.
    async fn assign(
        &self,
        record: AssignmentRecord,
    ) -> Result<Option<AssignmentRecord>, RepositoryError>;

    async fn assignment_history(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<AssignmentRecord>, RepositoryError>;

    /// Number of leads currently held by each assignee that holds any.
    async fn assignment_counts(&self) -> Result<Vec<(AssigneeId, u64)>, RepositoryError>;

    /// Replaces the lead's score record and its score/temperature columns in
    /// one write. Returns `false` when the lead does not exist.
    async fn save_score(&self, score: LeadScore) -> Result<bool, RepositoryError>;

    async fn find_score(&self, lead_id: &LeadId) -> Result<Option<LeadScore>, RepositoryError>;

    /// Hot scores, highest first, most recently calculated first on ties.
    async fn hot_scores(&self, limit: u32) -> Result<Vec<LeadScore>, RepositoryError>;
}

#[async_trait]
pub trait ScoringRuleRepository: Send + Sync {
    /// Rules ordered by descending priority, then creation time.
    async fn list(&self, active_only: bool) -> Result<Vec<ScoringRule>, RepositoryError>;
    async fn find_by_id(&self, id: &ScoringRuleId)
        -> Result<Option<ScoringRule>, RepositoryError>;
    async fn save(&self, rule: ScoringRule) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &ScoringRuleId) -> Result<bool, RepositoryError>;
    async fn toggle_active(
        &self,
        id: &ScoringRuleId,
    ) -> Result<Option<ScoringRule>, RepositoryError>;
}

#[async_trait]
pub trait DistributionRuleRepository: Send + Sync {
    /// Rules ordered by descending priority, then creation time.
    async fn list(&self, active_only: bool) -> Result<Vec<DistributionRule>, RepositoryError>;
    async fn find_by_id(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError>;
    async fn save(&self, rule: DistributionRule) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &DistributionRuleId) -> Result<bool, RepositoryError>;
    async fn toggle_active(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError>;
}

/// Fixed-width timestamps so text ordering matches time ordering.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

pub(crate) fn column<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    field: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{field}: {e}")))
}

pub(crate) fn encode_json<T: Serialize>(value: &T, field: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("{field}: {e}")))
}
