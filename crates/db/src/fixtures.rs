use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use leadflow_core::domain::distribution::{
    DistributionMethod, DistributionRule, DistributionRuleId,
};
use leadflow_core::domain::lead::{AssigneeId, EngagementSignals, Lead, LeadId};
use leadflow_core::domain::scoring::ScoringRuleId;
use leadflow_core::scoring::default_rules;

use crate::connection::{begin_write, DbPool};
use crate::repositories::{
    DistributionRuleRepository, LeadRepository, RepositoryError, SqlDistributionRuleRepository,
    SqlLeadRepository, SqlScoringRuleRepository, ScoringRuleRepository,
};

/// Deterministic demo leads. Expected scores assume the default scoring catalogue.
const SEED_LEADS: &[SeedLeadContract] = &[
    SeedLeadContract {
        id: "lead-demo-001",
        email: Some("ada@acme.example"),
        phone: Some("+1-555-0100"),
        company_id: Some("acct-acme"),
        source: Some("referral"),
        estimated_value_cents: 4_500_000,
        engagement: (4, 2, 3),
        expected_score: 115,
        description: "Referral with full contact details and strong engagement",
    },
    SeedLeadContract {
        id: "lead-demo-002",
        email: Some("grace@globex.example"),
        phone: None,
        company_id: Some("acct-globex"),
        source: Some("website"),
        estimated_value_cents: 1_200_000,
        engagement: (1, 0, 0),
        expected_score: 35,
        description: "Inbound website visitor with company",
    },
    SeedLeadContract {
        id: "lead-demo-003",
        email: None,
        phone: None,
        company_id: None,
        source: Some("trade_show"),
        estimated_value_cents: 0,
        engagement: (0, 0, 0),
        expected_score: 0,
        description: "Badge scan with no contact details",
    },
];

const SEED_AGENTS: &[&str] = &["agent-7", "agent-8", "agent-9"];

const SEED_DISTRIBUTION_RULE_ID: &str = "dist-demo-round-robin";

const SEED_SCORING_RULE_PREFIX: &str = "scoring-default-";

/// Demo dataset: the default scoring catalogue, one round-robin distribution
/// rule over three agents, and a handful of unscored, unassigned leads.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let scoring = SqlScoringRuleRepository::new(pool.clone());
        let distribution = SqlDistributionRuleRepository::new(pool.clone());
        let leads = SqlLeadRepository::new(pool.clone());
        let base = Utc::now();

        let defaults = default_rules();
        for (index, default) in defaults.iter().enumerate() {
            let mut rule = default.to_rule(base + Duration::milliseconds(index as i64));
            rule.id = ScoringRuleId(format!("{SEED_SCORING_RULE_PREFIX}{index:02}"));
            scoring.save(rule).await?;
        }

        distribution.save(seed_distribution_rule(base)).await?;

        let mut leads_seeded = Vec::with_capacity(SEED_LEADS.len());
        for (index, contract) in SEED_LEADS.iter().enumerate() {
            leads.save(contract.to_lead(base + Duration::milliseconds(index as i64))).await?;
            leads_seeded.push(LeadSeedInfo {
                lead_id: contract.id,
                expected_score: contract.expected_score,
                description: contract.description,
            });
        }

        Ok(SeedResult {
            scoring_rules_seeded: defaults.len(),
            distribution_rules_seeded: 1,
            leads_seeded,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let scoring_rules: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM scoring_rule WHERE id LIKE ?1 || '%' AND active = 1",
        )
        .bind(SEED_SCORING_RULE_PREFIX)
        .fetch_one(pool)
        .await?;
        checks.push(("default-scoring-rules", scoring_rules as usize == default_rules().len()));

        let distribution = SqlDistributionRuleRepository::new(pool.clone());
        let rule = distribution
            .find_by_id(&DistributionRuleId(SEED_DISTRIBUTION_RULE_ID.to_string()))
            .await?;
        let pool_ok = rule.as_ref().is_some_and(|rule| {
            rule.method == DistributionMethod::RoundRobin
                && rule.assignees.iter().map(|a| a.0.as_str()).eq(SEED_AGENTS.iter().copied())
        });
        checks.push(("round-robin-rule", pool_ok));

        let leads = SqlLeadRepository::new(pool.clone());
        for contract in SEED_LEADS {
            let present = leads.find_by_id(&LeadId(contract.id.to_string())).await?.is_some();
            checks.push((contract.id, present));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes everything `load` wrote. Assignment history cascades with the leads.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = begin_write(pool).await?;

        for contract in SEED_LEADS {
            sqlx::query("DELETE FROM lead WHERE id = ?1").bind(contract.id).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM distribution_rule WHERE id = ?1")
            .bind(SEED_DISTRIBUTION_RULE_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM scoring_rule WHERE id LIKE ?1 || '%'")
            .bind(SEED_SCORING_RULE_PREFIX)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn seed_distribution_rule(now: chrono::DateTime<Utc>) -> DistributionRule {
    DistributionRule {
        id: DistributionRuleId(SEED_DISTRIBUTION_RULE_ID.to_string()),
        name: "Default Round Robin".to_string(),
        description: Some("Rotates every lead across the demo sales team".to_string()),
        priority: 0,
        method: DistributionMethod::RoundRobin,
        conditions: Vec::new(),
        assignees: SEED_AGENTS.iter().map(|agent| AssigneeId::from(*agent)).collect(),
        weights: BTreeMap::new(),
        max_leads_per_assignee: None,
        working_hours: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug)]
struct SeedLeadContract {
    id: &'static str,
    email: Option<&'static str>,
    phone: Option<&'static str>,
    company_id: Option<&'static str>,
    source: Option<&'static str>,
    estimated_value_cents: i64,
    /// (website visits, form submissions, emails opened)
    engagement: (u32, u32, u32),
    expected_score: i32,
    description: &'static str,
}

impl SeedLeadContract {
    fn to_lead(&self, created_at: chrono::DateTime<Utc>) -> Lead {
        let (website_visits, form_submissions, emails_opened) = self.engagement;
        let mut lead = Lead::new(self.id);
        lead.email = self.email.map(String::from);
        lead.phone = self.phone.map(String::from);
        lead.company_id = self.company_id.map(String::from);
        lead.source = self.source.map(String::from);
        lead.estimated_value = Decimal::new(self.estimated_value_cents, 2);
        lead.engagement = EngagementSignals { website_visits, form_submissions, emails_opened };
        lead.created_at = created_at;
        lead.updated_at = created_at;
        lead
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub scoring_rules_seeded: usize,
    pub distribution_rules_seeded: usize,
    pub leads_seeded: Vec<LeadSeedInfo>,
}

#[derive(Debug)]
pub struct LeadSeedInfo {
    pub lead_id: &'static str,
    pub expected_score: i32,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
