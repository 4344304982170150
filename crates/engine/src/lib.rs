//! Lead routing engine: scoring and distribution operations over the rule
//! and lead stores.

pub mod distribution;
pub mod scoring;
pub mod workload;

use std::sync::Arc;

use leadflow_core::config::AppConfig;
use leadflow_core::errors::ApplicationError;
use leadflow_core::events::{EventPublisher, LeadEvent};
use leadflow_core::AssignmentSelector;
use leadflow_db::repositories::{
    DistributionRuleRepository, InMemoryDistributionRuleRepository, InMemoryLeadRepository,
    InMemoryScoringRuleRepository, LeadRepository, RepositoryError, ScoringRuleRepository,
    SqlDistributionRuleRepository, SqlLeadRepository, SqlScoringRuleRepository,
};
use leadflow_db::DbPool;
use tracing::warn;

pub use distribution::{
    AssignmentOutcome, BulkAssignItem, BulkAssignReport, DistributionService, DistributionStats,
};
pub use scoring::{BulkCalculateRequest, BulkScoreItem, BulkScoreReport, ScoringService};
pub use workload::WorkloadTracker;

/// Both operation groups wired to one set of stores.
pub struct RoutingEngine {
    pub scoring: ScoringService,
    pub distribution: DistributionService,
}

impl RoutingEngine {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        scoring_rules: Arc<dyn ScoringRuleRepository>,
        distribution_rules: Arc<dyn DistributionRuleRepository>,
        selector: AssignmentSelector,
        publisher: Arc<dyn EventPublisher>,
        config: &AppConfig,
    ) -> Self {
        let scoring = ScoringService::new(leads.clone(), scoring_rules, publisher.clone())
            .with_hot_lead_limits(
                config.scoring.hot_leads_default_limit,
                config.scoring.hot_leads_max_limit,
            );
        let distribution =
            DistributionService::new(leads, distribution_rules, selector, publisher);
        Self { scoring, distribution }
    }

    pub fn from_pool(pool: DbPool, config: &AppConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::new(
            Arc::new(SqlLeadRepository::new(pool.clone())),
            Arc::new(SqlScoringRuleRepository::new(pool.clone())),
            Arc::new(SqlDistributionRuleRepository::new(pool)),
            selector_from_config(config),
            publisher,
            config,
        )
    }

    /// Engine over empty in-memory stores. Returns the lead store so callers
    /// can seed leads directly.
    pub fn in_memory(
        config: &AppConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> (Self, Arc<InMemoryLeadRepository>) {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let engine = Self::new(
            leads.clone(),
            Arc::new(InMemoryScoringRuleRepository::default()),
            Arc::new(InMemoryDistributionRuleRepository::default()),
            selector_from_config(config),
            publisher,
            config,
        );
        (engine, leads)
    }
}

pub fn selector_from_config(config: &AppConfig) -> AssignmentSelector {
    let cursor = config.routing.cursor_scope.build();
    match config.routing.random_seed {
        Some(seed) => AssignmentSelector::with_seed(cursor, seed),
        None => AssignmentSelector::new(cursor),
    }
}

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Hands `event` to the sink. A rejected event is logged and otherwise ignored.
pub(crate) fn publish(publisher: &dyn EventPublisher, event: LeadEvent) {
    let kind = event.kind.as_str();
    let lead_id = event.lead_id.clone();
    let correlation_id = event.correlation_id.clone();
    if let Err(error) = publisher.publish(event) {
        warn!(
            event_name = "events.publish_failed",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            event_kind = kind,
            error = %error,
            "lead event could not be published"
        );
    }
}
