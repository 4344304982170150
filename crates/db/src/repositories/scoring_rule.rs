use leadflow_core::domain::scoring::{RuleCategory, ScoreCondition, ScoringRule, ScoringRuleId};

use super::{
    column, decode_json, decode_timestamp, encode_json, encode_timestamp, RepositoryError,
    ScoringRuleRepository,
};
use crate::connection::begin_write;
use crate::DbPool;

const RULE_COLUMNS: &str = "id, name, description, category, priority, points, active,
     conditions_json, created_at, updated_at";

pub struct SqlScoringRuleRepository {
    pool: DbPool,
}

impl SqlScoringRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<ScoringRule, RepositoryError> {
    let category: String = column(row, "category")?;
    let priority: i64 = column(row, "priority")?;
    let points: i64 = column(row, "points")?;
    let active: i64 = column(row, "active")?;
    let conditions: String = column(row, "conditions_json")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(ScoringRule {
        id: ScoringRuleId(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        category: RuleCategory::parse(&category)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown category `{category}`")))?,
        priority: i32::try_from(priority)
            .map_err(|_| RepositoryError::Decode(format!("priority out of range: {priority}")))?,
        points: i32::try_from(points)
            .map_err(|_| RepositoryError::Decode(format!("points out of range: {points}")))?,
        active: active != 0,
        conditions: decode_json::<Vec<ScoreCondition>>(&conditions, "conditions_json")?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ScoringRuleRepository for SqlScoringRuleRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<ScoringRule>, RepositoryError> {
        let filter = if active_only { "WHERE active = 1" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM scoring_rule {filter}
             ORDER BY priority DESC, created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule).collect()
    }

    async fn find_by_id(
        &self,
        id: &ScoringRuleId,
    ) -> Result<Option<ScoringRule>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM scoring_rule WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_rule).transpose()
    }

    async fn save(&self, rule: ScoringRule) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO scoring_rule (id, name, description, category, priority, points, active,
                                       conditions_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 category = excluded.category,
                 priority = excluded.priority,
                 points = excluded.points,
                 active = excluded.active,
                 conditions_json = excluded.conditions_json,
                 updated_at = excluded.updated_at",
        )
        .bind(&rule.id.0)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.category.as_str())
        .bind(rule.priority)
        .bind(rule.points)
        .bind(rule.active)
        .bind(encode_json(&rule.conditions, "conditions_json")?)
        .bind(encode_timestamp(&rule.created_at))
        .bind(encode_timestamp(&rule.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &ScoringRuleId) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM scoring_rule WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn toggle_active(
        &self,
        id: &ScoringRuleId,
    ) -> Result<Option<ScoringRule>, RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;
        sqlx::query(
            "UPDATE scoring_rule
             SET active = CASE active WHEN 0 THEN 1 ELSE 0 END, updated_at = ?
             WHERE id = ?",
        )
        .bind(encode_timestamp(&chrono::Utc::now()))
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM scoring_rule WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        row.as_ref().map(row_to_rule).transpose()
    }
}
