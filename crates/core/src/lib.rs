pub mod config;
pub mod distribution;
pub mod domain;
pub mod errors;
pub mod events;
pub mod scoring;
pub mod workload;

pub use distribution::{AssignmentSelector, CursorScope, RouteDecision, RouteStage};
pub use domain::distribution::{
    AssignmentOrigin, AssignmentRecord, DistributionMethod, DistributionRule,
    DistributionRuleDraft, DistributionRuleId, RoutingCondition, WorkingHours,
};
pub use domain::lead::{AssigneeId, EngagementSignals, Lead, LeadId};
pub use domain::scoring::{
    LeadScore, RuleCategory, ScoreCondition, ScoringRule, ScoringRuleDraft, ScoringRuleId,
    Temperature,
};
pub use errors::{ApplicationError, DomainError, InterfaceError, SelectionError};
pub use events::{EventPublisher, LeadEvent, LeadEventKind, NoopPublisher};
pub use scoring::ScoreEvaluator;
pub use workload::{WorkloadEntry, WorkloadSnapshot, DEFAULT_CAPACITY};
