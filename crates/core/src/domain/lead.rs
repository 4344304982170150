use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::scoring::Temperature;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the agent (user) a lead can be routed to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssigneeId(pub String);

impl fmt::Display for AssigneeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssigneeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Behavioural counters recorded against a lead by the capture pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSignals {
    pub website_visits: u32,
    pub form_submissions: u32,
    pub emails_opened: u32,
}

/// A lead as owned by the lead store. Only `score`, `temperature` and
/// `assigned_to` are ever written back by the routing engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<String>,
    pub source: Option<String>,
    pub estimated_value: Decimal,
    #[serde(default)]
    pub engagement: EngagementSignals,
    pub score: i32,
    pub temperature: Option<Temperature>,
    pub assigned_to: Option<AssigneeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId(id.into()),
            email: None,
            phone: None,
            company_id: None,
            source: None,
            estimated_value: Decimal::ZERO,
            engagement: EngagementSignals::default(),
            score: 0,
            temperature: None,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn has_email(&self) -> bool {
        non_blank(self.email.as_deref())
    }

    pub fn has_phone(&self) -> bool {
        non_blank(self.phone.as_deref())
    }

    pub fn has_company(&self) -> bool {
        self.company_id.is_some()
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::Lead;

    #[test]
    fn blank_contact_fields_do_not_count_as_present() {
        let lead = Lead::new("L-1").with_email("   ").with_phone("");
        assert!(!lead.has_email());
        assert!(!lead.has_phone());
    }

    #[test]
    fn company_reference_presence_is_checked_by_option() {
        let lead = Lead::new("L-2").with_company("ACME-1");
        assert!(lead.has_company());
        assert!(!Lead::new("L-3").has_company());
    }
}
