//! Readiness probe: the database answers and the reporting schema is fully migrated.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use fieldpulse_db::{migrations::MIGRATOR, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaStatus {
    pub applied_migrations: i64,
    pub expected_migrations: i64,
    pub employees: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessReport {
    pub status: Readiness,
    pub service: &'static str,
    pub schema: Option<SchemaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<ReadinessReport>) {
    let (schema, problem) = match inspect_schema(&pool).await {
        Ok(schema) if schema.applied_migrations < schema.expected_migrations => {
            let problem = format!(
                "{} of {} migrations applied",
                schema.applied_migrations, schema.expected_migrations
            );
            (Some(schema), Some(problem))
        }
        Ok(schema) => (Some(schema), None),
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "health probe could not read the reporting schema"
            );
            (None, Some("database unavailable".to_string()))
        }
    };

    let status = if problem.is_none() { Readiness::Ready } else { Readiness::Degraded };
    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    let report = ReadinessReport {
        status,
        service: "fieldpulse-server",
        schema,
        problem,
        checked_at: Utc::now(),
    };
    (code, Json(report))
}

async fn inspect_schema(pool: &DbPool) -> Result<SchemaStatus, sqlx::Error> {
    let expected_migrations = i64::try_from(MIGRATOR.iter().count()).unwrap_or(i64::MAX);
    let migrations_table: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if migrations_table == 0 {
        return Ok(SchemaStatus { applied_migrations: 0, expected_migrations, employees: None });
    }

    let applied_migrations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    let employees = if applied_migrations >= expected_migrations {
        Some(sqlx::query_scalar("SELECT COUNT(*) FROM employee").fetch_one(pool).await?)
    } else {
        None
    };

    Ok(SchemaStatus { applied_migrations, expected_migrations, employees })
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use fieldpulse_db::{connect_in_memory, migrations, SeedDataset};

    use super::{health, Readiness};

    #[tokio::test]
    async fn seeded_database_reports_ready_with_employee_count() {
        let pool = connect_in_memory().await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("seed");

        let (code, Json(report)) = health(State(pool.clone())).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(report.status, Readiness::Ready);
        let schema = report.schema.expect("schema status");
        assert_eq!(schema.applied_migrations, schema.expected_migrations);
        assert_eq!(schema.employees, Some(10));
        assert!(report.problem.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_is_degraded() {
        let pool = connect_in_memory().await.expect("pool should connect");

        let (code, Json(report)) = health(State(pool.clone())).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, Readiness::Degraded);
        let schema = report.schema.expect("schema status");
        assert_eq!(schema.applied_migrations, 0);
        assert_eq!(schema.employees, None);
        assert!(report.problem.expect("problem").contains("migrations applied"));

        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_is_degraded_without_schema() {
        let pool = connect_in_memory().await.expect("pool should connect");
        pool.close().await;

        let (code, Json(report)) = health(State(pool)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, Readiness::Degraded);
        assert!(report.schema.is_none());
        assert_eq!(report.problem.as_deref(), Some("database unavailable"));
    }
}
