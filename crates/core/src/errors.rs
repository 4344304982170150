use thiserror::Error;

use crate::domain::distribution::{DistributionMethod, DistributionRuleId};
use crate::domain::lead::LeadId;
use crate::domain::scoring::ScoringRuleId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("distribution method `{0}` is not supported yet")]
    UnsupportedMethod(DistributionMethod),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("lead `{0}` not found")]
    LeadNotFound(LeadId),
    #[error("scoring rule `{0}` not found")]
    ScoringRuleNotFound(ScoringRuleId),
    #[error("distribution rule `{0}` not found")]
    DistributionRuleNotFound(DistributionRuleId),
    #[error("no score has been calculated for lead `{0}`")]
    ScoreNotFound(LeadId),
    #[error("no distribution rules configured for lead `{0}`")]
    NoRulesConfigured(LeadId),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LeadNotFound(_)
                | Self::ScoringRuleNotFound(_)
                | Self::DistributionRuleNotFound(_)
                | Self::ScoreNotFound(_)
        )
    }

    /// Stable, machine-readable class used by transports and bulk result slots.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "validation",
            Self::Selection(_) => "unsupported_method",
            Self::LeadNotFound(_)
            | Self::ScoringRuleNotFound(_)
            | Self::DistributionRuleNotFound(_)
            | Self::ScoreNotFound(_) => "not_found",
            Self::NoRulesConfigured(_) => "no_rules_configured",
            Self::Persistence(_) => "persistence",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested lead or rule does not exist.",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unprocessable { .. } => {
                "The lead could not be routed with the current rule configuration."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            error if error.is_not_found() => Self::NotFound { message, correlation_id },
            ApplicationError::Domain(DomainError::Validation(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Selection(_) | ApplicationError::NoRulesConfigured(_) => {
                Self::Unprocessable { message, correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            _ => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::distribution::DistributionMethod;
    use crate::domain::lead::LeadId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError, SelectionError};

    #[test]
    fn missing_lead_maps_to_not_found() {
        let interface =
            ApplicationError::LeadNotFound(LeadId("L-404".to_owned())).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("L-404")
        ));
    }

    #[test]
    fn validation_error_maps_to_bad_request_with_user_safe_message() {
        let interface =
            ApplicationError::from(DomainError::Validation("empty name".to_owned()))
                .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn routing_failures_are_unprocessable() {
        let no_rules = ApplicationError::NoRulesConfigured(LeadId("L-1".to_owned()))
            .into_interface("req-3");
        let unsupported =
            ApplicationError::from(SelectionError::UnsupportedMethod(
                DistributionMethod::Geographic,
            ))
                .into_interface("req-4");

        assert!(matches!(no_rules, InterfaceError::Unprocessable { .. }));
        assert!(matches!(unsupported, InterfaceError::Unprocessable { .. }));
        assert_eq!(unsupported.correlation_id(), "req-4");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Persistence("database lock timeout".to_owned()).into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn error_classes_are_stable() {
        assert_eq!(ApplicationError::NoRulesConfigured(LeadId("x".into())).class(), "no_rules_configured");
        assert_eq!(ApplicationError::LeadNotFound(LeadId("x".into())).class(), "not_found");
    }
}
