use std::collections::BTreeMap;

use leadflow_core::domain::distribution::{
    DistributionMethod, DistributionRule, DistributionRuleId, RoutingCondition, WorkingHours,
};
use leadflow_core::domain::lead::AssigneeId;

use super::{
    column, decode_json, decode_timestamp, encode_json, encode_timestamp,
    DistributionRuleRepository, RepositoryError,
};
use crate::connection::begin_write;
use crate::DbPool;

const RULE_COLUMNS: &str = "id, name, description, priority, method, conditions_json,
     assignees_json, weights_json, max_leads_per_assignee, working_hours_json, active,
     created_at, updated_at";

pub struct SqlDistributionRuleRepository {
    pool: DbPool,
}

impl SqlDistributionRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<DistributionRule, RepositoryError> {
    let priority: i64 = column(row, "priority")?;
    let method: String = column(row, "method")?;
    let conditions: String = column(row, "conditions_json")?;
    let assignees: String = column(row, "assignees_json")?;
    let weights: String = column(row, "weights_json")?;
    let max_leads: Option<i64> = column(row, "max_leads_per_assignee")?;
    let working_hours: Option<String> = column(row, "working_hours_json")?;
    let active: i64 = column(row, "active")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(DistributionRule {
        id: DistributionRuleId(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        priority: i32::try_from(priority)
            .map_err(|_| RepositoryError::Decode(format!("priority out of range: {priority}")))?,
        method: DistributionMethod::parse(&method)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown method `{method}`")))?,
        conditions: decode_json::<Vec<RoutingCondition>>(&conditions, "conditions_json")?,
        assignees: decode_json::<Vec<AssigneeId>>(&assignees, "assignees_json")?,
        weights: decode_json::<BTreeMap<AssigneeId, f64>>(&weights, "weights_json")?,
        max_leads_per_assignee: max_leads
            .map(|value| {
                u32::try_from(value).map_err(|_| {
                    RepositoryError::Decode(format!("max_leads_per_assignee out of range: {value}"))
                })
            })
            .transpose()?,
        working_hours: working_hours
            .as_deref()
            .map(|raw| decode_json::<WorkingHours>(raw, "working_hours_json"))
            .transpose()?,
        active: active != 0,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl DistributionRuleRepository for SqlDistributionRuleRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<DistributionRule>, RepositoryError> {
        let filter = if active_only { "WHERE active = 1" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM distribution_rule {filter}
             ORDER BY priority DESC, created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule).collect()
    }

    async fn find_by_id(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM distribution_rule WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_rule).transpose()
    }

    async fn save(&self, rule: DistributionRule) -> Result<(), RepositoryError> {
        let working_hours = rule
            .working_hours
            .as_ref()
            .map(|hours| encode_json(hours, "working_hours_json"))
            .transpose()?;

        sqlx::query(
            "INSERT INTO distribution_rule (id, name, description, priority, method,
                                            conditions_json, assignees_json, weights_json,
                                            max_leads_per_assignee, working_hours_json, active,
                                            created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 priority = excluded.priority,
                 method = excluded.method,
                 conditions_json = excluded.conditions_json,
                 assignees_json = excluded.assignees_json,
                 weights_json = excluded.weights_json,
                 max_leads_per_assignee = excluded.max_leads_per_assignee,
                 working_hours_json = excluded.working_hours_json,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&rule.id.0)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.priority)
        .bind(rule.method.as_str())
        .bind(encode_json(&rule.conditions, "conditions_json")?)
        .bind(encode_json(&rule.assignees, "assignees_json")?)
        .bind(encode_json(&rule.weights, "weights_json")?)
        .bind(rule.max_leads_per_assignee.map(i64::from))
        .bind(working_hours)
        .bind(rule.active)
        .bind(encode_timestamp(&rule.created_at))
        .bind(encode_timestamp(&rule.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &DistributionRuleId) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM distribution_rule WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn toggle_active(
        &self,
        id: &DistributionRuleId,
    ) -> Result<Option<DistributionRule>, RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;
        sqlx::query(
            "UPDATE distribution_rule
             SET active = CASE active WHEN 0 THEN 1 ELSE 0 END, updated_at = ?
             WHERE id = ?",
        )
        .bind(encode_timestamp(&chrono::Utc::now()))
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        let row =
            sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM distribution_rule WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;

        row.as_ref().map(row_to_rule).transpose()
    }
}
