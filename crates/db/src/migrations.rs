use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_in_memory;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "lead",
        "lead_score",
        "scoring_rule",
        "distribution_rule",
        "lead_assignment",
        "idx_lead_assigned_to",
        "idx_lead_score_temperature",
        "idx_scoring_rule_active_priority",
        "idx_distribution_rule_active_priority",
        "idx_lead_assignment_lead_id",
        "idx_lead_assignment_assigned_at",
    ];

    #[tokio::test]
    async fn migrations_create_routing_schema() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("inspect sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "schema object `{object}` should exist");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run is a no-op");
        pool.close().await;
    }

    #[tokio::test]
    async fn distribution_method_is_constrained() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO distribution_rule (id, name, method, created_at, updated_at)
             VALUES ('r1', 'bad', 'fifo', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "unknown method should violate the CHECK constraint");
        pool.close().await;
    }
}
