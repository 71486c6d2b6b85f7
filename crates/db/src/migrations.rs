use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::run_pending;
    use crate::connect_in_memory;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "employee",
        "kpi_score",
        "sale",
        "commitment",
        "escalation",
        "info_message",
        "idx_employee_parent_territory_code",
        "idx_employee_manager_code",
        "idx_employee_role",
        "idx_kpi_score_employee_period",
        "idx_kpi_score_period",
        "idx_sale_sale_date",
        "idx_sale_employee_code",
        "idx_commitment_employee_period",
        "idx_escalation_employee_code",
        "idx_escalation_status",
        "idx_info_message_created_at",
    ];

    #[tokio::test]
    async fn migrations_create_every_managed_schema_object() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE name = ?")
                    .bind(name)
                    .fetch_one(&pool)
                    .await
                    .expect("query sqlite_master");
            assert_eq!(count, 1, "schema object `{name}` should exist after migrations");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("count applied migrations");
        assert_eq!(applied, 1);

        pool.close().await;
    }
}
