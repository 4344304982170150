use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use leadflow_core::domain::distribution::{AssignmentOrigin, AssignmentRecord};
use leadflow_core::domain::lead::{AssigneeId, EngagementSignals, Lead, LeadId};
use leadflow_core::domain::scoring::{LeadScore, Temperature};

use super::{
    column, decode_json, decode_timestamp, encode_json, encode_timestamp, LeadCounts,
    LeadRepository, RepositoryError,
};
use crate::connection::begin_write;
use crate::DbPool;

const LEAD_COLUMNS: &str = "id, email, phone, company_id, source, estimated_value,
     website_visits, form_submissions, emails_opened, score, temperature,
     assigned_to, created_at, updated_at";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_temperature(raw: Option<String>) -> Result<Option<Temperature>, RepositoryError> {
    match raw {
        None => Ok(None),
        Some(value) => Temperature::parse(&value)
            .map(Some)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown temperature `{value}`"))),
    }
}

fn counter(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<u32, RepositoryError> {
    let raw: i64 = column(row, name)?;
    u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("{name} out of range: {raw}")))
}

fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, RepositoryError> {
    let estimated_value: String = column(row, "estimated_value")?;
    let estimated_value = Decimal::from_str(&estimated_value)
        .map_err(|e| RepositoryError::Decode(format!("estimated_value: {e}")))?;
    let score: i64 = column(row, "score")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Lead {
        id: LeadId(column(row, "id")?),
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        company_id: column(row, "company_id")?,
        source: column(row, "source")?,
        estimated_value,
        engagement: EngagementSignals {
            website_visits: counter(row, "website_visits")?,
            form_submissions: counter(row, "form_submissions")?,
            emails_opened: counter(row, "emails_opened")?,
        },
        score: i32::try_from(score)
            .map_err(|_| RepositoryError::Decode(format!("score out of range: {score}")))?,
        temperature: parse_temperature(column(row, "temperature")?)?,
        assigned_to: column::<Option<String>>(row, "assigned_to")?.map(AssigneeId),
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

fn row_to_score(row: &sqlx::sqlite::SqliteRow) -> Result<LeadScore, RepositoryError> {
    let total_score: i64 = column(row, "total_score")?;
    let temperature: String = column(row, "temperature")?;
    let breakdown: String = column(row, "breakdown_json")?;
    let calculated_at: String = column(row, "calculated_at")?;

    Ok(LeadScore {
        lead_id: LeadId(column(row, "lead_id")?),
        total_score: i32::try_from(total_score)
            .map_err(|_| RepositoryError::Decode(format!("score out of range: {total_score}")))?,
        temperature: Temperature::parse(&temperature)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown temperature `{temperature}`")))?,
        breakdown: decode_json::<IndexMap<String, i32>>(&breakdown, "breakdown_json")?,
        calculated_at: decode_timestamp(&calculated_at)?,
    })
}

fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> Result<AssignmentRecord, RepositoryError> {
    let origin: String = column(row, "origin_json")?;
    let assigned_at: String = column(row, "assigned_at")?;

    Ok(AssignmentRecord {
        id: column(row, "id")?,
        lead_id: LeadId(column(row, "lead_id")?),
        previous_assignee: column::<Option<String>>(row, "previous_assignee")?.map(AssigneeId),
        assignee: AssigneeId(column(row, "assignee")?),
        origin: decode_json::<AssignmentOrigin>(&origin, "origin_json")?,
        assigned_at: decode_timestamp(&assigned_at)?,
    })
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_lead).transpose()
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead (id, email, phone, company_id, source, estimated_value,
                               website_visits, form_submissions, emails_opened, score,
                               temperature, assigned_to, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 email = excluded.email,
                 phone = excluded.phone,
                 company_id = excluded.company_id,
                 source = excluded.source,
                 estimated_value = excluded.estimated_value,
                 website_visits = excluded.website_visits,
                 form_submissions = excluded.form_submissions,
                 emails_opened = excluded.emails_opened,
                 score = excluded.score,
                 temperature = excluded.temperature,
                 assigned_to = excluded.assigned_to,
                 updated_at = excluded.updated_at",
        )
        .bind(&lead.id.0)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company_id)
        .bind(&lead.source)
        .bind(lead.estimated_value.to_string())
        .bind(i64::from(lead.engagement.website_visits))
        .bind(i64::from(lead.engagement.form_submissions))
        .bind(i64::from(lead.engagement.emails_opened))
        .bind(lead.score)
        .bind(lead.temperature.map(|t| t.as_str()))
        .bind(lead.assigned_to.as_ref().map(|a| a.0.as_str()))
        .bind(encode_timestamp(&lead.created_at))
        .bind(encode_timestamp(&lead.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<LeadId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM lead ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| column::<String>(row, "id").map(LeadId)).collect()
    }

    async fn counts(&self) -> Result<LeadCounts, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COUNT(assigned_to) AS assigned
             FROM lead",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = column(&row, "total")?;
        let assigned: i64 = column(&row, "assigned")?;
        Ok(LeadCounts { total: total.max(0) as u64, assigned: assigned.max(0) as u64 })
    }

    async fn assign(
        &self,
        record: AssignmentRecord,
    ) -> Result<Option<AssignmentRecord>, RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;

        let current = sqlx::query("SELECT assigned_to FROM lead WHERE id = ?")
            .bind(&record.lead_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };
        let previous = column::<Option<String>>(&current, "assigned_to")?.map(AssigneeId);

        let assigned_at = encode_timestamp(&record.assigned_at);
        sqlx::query("UPDATE lead SET assigned_to = ?, updated_at = ? WHERE id = ?")
            .bind(&record.assignee.0)
            .bind(&assigned_at)
            .bind(&record.lead_id.0)
            .execute(&mut *tx)
            .await?;

        let stored = AssignmentRecord { previous_assignee: previous, ..record };
        sqlx::query(
            "INSERT INTO lead_assignment (id, lead_id, previous_assignee, assignee, origin_json, assigned_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&stored.id)
        .bind(&stored.lead_id.0)
        .bind(stored.previous_assignee.as_ref().map(|a| a.0.as_str()))
        .bind(&stored.assignee.0)
        .bind(encode_json(&stored.origin, "origin_json")?)
        .bind(&assigned_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn assignment_history(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<AssignmentRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lead_id, previous_assignee, assignee, origin_json, assigned_at
             FROM lead_assignment
             WHERE lead_id = ?
             ORDER BY assigned_at ASC, rowid ASC",
        )
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_assignment).collect()
    }

    async fn assignment_counts(&self) -> Result<Vec<(AssigneeId, u64)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT assigned_to, COUNT(*) AS open_count
             FROM lead
             WHERE assigned_to IS NOT NULL
             GROUP BY assigned_to
             ORDER BY assigned_to ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let assignee: String = column(row, "assigned_to")?;
                let count: i64 = column(row, "open_count")?;
                Ok((AssigneeId(assignee), count.max(0) as u64))
            })
            .collect()
    }

    async fn save_score(&self, score: LeadScore) -> Result<bool, RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;
        let calculated_at = encode_timestamp(&score.calculated_at);

        let updated =
            sqlx::query("UPDATE lead SET score = ?, temperature = ?, updated_at = ? WHERE id = ?")
                .bind(score.total_score)
                .bind(score.temperature.as_str())
                .bind(&calculated_at)
                .bind(&score.lead_id.0)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO lead_score (lead_id, total_score, temperature, breakdown_json, calculated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(lead_id) DO UPDATE SET
                 total_score = excluded.total_score,
                 temperature = excluded.temperature,
                 breakdown_json = excluded.breakdown_json,
                 calculated_at = excluded.calculated_at",
        )
        .bind(&score.lead_id.0)
        .bind(score.total_score)
        .bind(score.temperature.as_str())
        .bind(encode_json(&score.breakdown, "breakdown_json")?)
        .bind(&calculated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_score(&self, lead_id: &LeadId) -> Result<Option<LeadScore>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lead_id, total_score, temperature, breakdown_json, calculated_at
             FROM lead_score WHERE lead_id = ?",
        )
        .bind(&lead_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_score).transpose()
    }

    async fn hot_scores(&self, limit: u32) -> Result<Vec<LeadScore>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lead_id, total_score, temperature, breakdown_json, calculated_at
             FROM lead_score
             WHERE temperature = 'hot'
             ORDER BY total_score DESC, calculated_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_score).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use indexmap::IndexMap;
    use rust_decimal::Decimal;

    use leadflow_core::domain::distribution::{AssignmentOrigin, AssignmentRecord};
    use leadflow_core::domain::lead::{AssigneeId, Lead, LeadId};
    use leadflow_core::domain::scoring::{LeadScore, Temperature};

    use super::SqlLeadRepository;
    use crate::repositories::{LeadCounts, LeadRepository};
    use crate::{connect_in_memory, connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, SqlLeadRepository) {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        (pool.clone(), SqlLeadRepository::new(pool))
    }

    fn score(lead_id: &str, total: i32, offset_secs: i64) -> LeadScore {
        let mut breakdown = IndexMap::new();
        breakdown.insert("Referral Source".to_string(), total);
        LeadScore {
            lead_id: LeadId(lead_id.to_string()),
            total_score: total,
            temperature: Temperature::from_score(total),
            breakdown,
            calculated_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_lead() {
        let (pool, repo) = setup().await;
        let mut lead = Lead::new("lead-1")
            .with_email("ada@example.com")
            .with_company("acme")
            .with_source("referral");
        lead.estimated_value = Decimal::new(125_050, 2);
        lead.engagement.website_visits = 3;

        repo.save(lead.clone()).await.expect("save");
        let found = repo.find_by_id(&lead.id).await.expect("find").expect("present");

        assert_eq!(found.email.as_deref(), Some("ada@example.com"));
        assert_eq!(found.estimated_value, Decimal::new(125_050, 2));
        assert_eq!(found.engagement.website_visits, 3);
        assert_eq!(found.source.as_deref(), Some("referral"));
        assert!(found.assigned_to.is_none());
        assert!(found.temperature.is_none());

        assert!(repo
            .find_by_id(&LeadId("missing".to_string()))
            .await
            .expect("find")
            .is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn assign_records_previous_assignee_and_history() {
        let (pool, repo) = setup().await;
        repo.save(Lead::new("lead-1")).await.expect("save");
        let lead_id = LeadId("lead-1".to_string());

        let first = repo
            .assign(AssignmentRecord::new(
                lead_id.clone(),
                AssigneeId::from("agent-7"),
                AssignmentOrigin::Bulk,
            ))
            .await
            .expect("assign")
            .expect("lead exists");
        assert!(first.previous_assignee.is_none());

        let second = repo
            .assign(AssignmentRecord::new(
                lead_id.clone(),
                AssigneeId::from("agent-8"),
                AssignmentOrigin::Manual { reason: Some("territory change".to_string()) },
            ))
            .await
            .expect("assign")
            .expect("lead exists");
        assert_eq!(second.previous_assignee, Some(AssigneeId::from("agent-7")));

        let lead = repo.find_by_id(&lead_id).await.expect("find").expect("present");
        assert_eq!(lead.assigned_to, Some(AssigneeId::from("agent-8")));

        let history = repo.assignment_history(&lead_id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].origin, second.origin);
        pool.close().await;
    }

    #[tokio::test]
    async fn assign_missing_lead_writes_nothing() {
        let (pool, repo) = setup().await;
        let result = repo
            .assign(AssignmentRecord::new(
                LeadId("ghost".to_string()),
                AssigneeId::from("agent-7"),
                AssignmentOrigin::Bulk,
            ))
            .await
            .expect("assign");
        assert!(result.is_none());

        let history =
            repo.assignment_history(&LeadId("ghost".to_string())).await.expect("history");
        assert!(history.is_empty());
        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assigns_on_file_store_all_commit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("leads.db").display());
        let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = Arc::new(SqlLeadRepository::new(pool.clone()));
        repo.save(Lead::new("lead-1")).await.expect("save");
        let lead_id = LeadId("lead-1".to_string());

        let mut handles = Vec::new();
        for index in 0..50 {
            let repo = Arc::clone(&repo);
            let lead_id = lead_id.clone();
            handles.push(tokio::spawn(async move {
                repo.assign(AssignmentRecord::new(
                    lead_id,
                    AssigneeId(format!("agent-{index}")),
                    AssignmentOrigin::Bulk,
                ))
                .await
            }));
        }
        for handle in handles {
            let stored = handle.await.expect("join").expect("assign");
            assert!(stored.is_some());
        }

        let history = repo.assignment_history(&lead_id).await.expect("history");
        assert_eq!(history.len(), 50);
        assert_eq!(history.iter().filter(|record| record.previous_assignee.is_none()).count(), 1);
        let lead = repo.find_by_id(&lead_id).await.expect("find").expect("present");
        assert!(lead.assigned_to.is_some());
        pool.close().await;
    }

    #[tokio::test]
    async fn counts_and_assignment_counts_reflect_current_holders() {
        let (pool, repo) = setup().await;
        for id in ["l1", "l2", "l3", "l4"] {
            repo.save(Lead::new(id)).await.expect("save");
        }
        for (lead, agent) in [("l1", "agent-7"), ("l2", "agent-7"), ("l3", "agent-8")] {
            repo.assign(AssignmentRecord::new(
                LeadId(lead.to_string()),
                AssigneeId::from(agent),
                AssignmentOrigin::Bulk,
            ))
            .await
            .expect("assign");
        }

        assert_eq!(repo.counts().await.expect("counts"), LeadCounts { total: 4, assigned: 3 });
        assert_eq!(
            repo.assignment_counts().await.expect("assignment counts"),
            vec![(AssigneeId::from("agent-7"), 2), (AssigneeId::from("agent-8"), 1)]
        );
        pool.close().await;
    }

    #[tokio::test]
    async fn save_score_updates_lead_and_replaces_previous_score() {
        let (pool, repo) = setup().await;
        repo.save(Lead::new("lead-1")).await.expect("save");

        assert!(repo.save_score(score("lead-1", 40, 0)).await.expect("first save"));
        assert!(repo.save_score(score("lead-1", 75, 1)).await.expect("second save"));

        let stored = repo
            .find_score(&LeadId("lead-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.total_score, 75);
        assert_eq!(stored.temperature, Temperature::Hot);
        assert_eq!(stored.breakdown.get("Referral Source"), Some(&75));

        let lead = repo
            .find_by_id(&LeadId("lead-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(lead.score, 75);
        assert_eq!(lead.temperature, Some(Temperature::Hot));

        assert!(!repo.save_score(score("ghost", 10, 0)).await.expect("missing lead"));
        pool.close().await;
    }

    #[tokio::test]
    async fn hot_scores_are_ordered_by_score_then_recency() {
        let (pool, repo) = setup().await;
        for id in ["a", "b", "c", "d"] {
            repo.save(Lead::new(id)).await.expect("save");
        }
        repo.save_score(score("a", 80, 0)).await.expect("score a");
        repo.save_score(score("b", 95, 0)).await.expect("score b");
        repo.save_score(score("c", 80, 5)).await.expect("score c");
        repo.save_score(score("d", 40, 0)).await.expect("score d");

        let hot = repo.hot_scores(10).await.expect("hot");
        let ids: Vec<&str> = hot.iter().map(|s| s.lead_id.0.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let limited = repo.hot_scores(1).await.expect("hot");
        assert_eq!(limited.len(), 1);
        pool.close().await;
    }
}
