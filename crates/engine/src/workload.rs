use std::sync::Arc;

use leadflow_core::errors::ApplicationError;
use leadflow_core::workload::{WorkloadEntry, WorkloadSnapshot};
use leadflow_db::repositories::LeadRepository;

use crate::persistence;

/// Current open-lead counts per assignee, always read fresh from the lead store.
#[derive(Clone)]
pub struct WorkloadTracker {
    leads: Arc<dyn LeadRepository>,
}

impl WorkloadTracker {
    pub fn new(leads: Arc<dyn LeadRepository>) -> Self {
        Self { leads }
    }

    pub async fn snapshot(&self) -> Result<WorkloadSnapshot, ApplicationError> {
        let counts = self.leads.assignment_counts().await.map_err(persistence)?;
        Ok(WorkloadSnapshot::from_counts(counts))
    }

    pub async fn entries(&self) -> Result<Vec<WorkloadEntry>, ApplicationError> {
        Ok(self.snapshot().await?.entries())
    }
}
