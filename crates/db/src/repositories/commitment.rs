use chrono::Utc;
use sqlx::Row;

use fieldpulse_core::domain::commitment::{Commitment, CommitmentId, CommitmentStatus};
use fieldpulse_core::domain::employee::EmployeeCode;

use super::{new_id, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlCommitmentRepository {
    pool: DbPool,
}

impl SqlCommitmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        employee_code: &str,
        product: &str,
        quantity: f64,
        amount: f64,
        period: &str,
    ) -> Result<Commitment, RepositoryError> {
        let now = Utc::now();
        let commitment = Commitment {
            id: CommitmentId(new_id("CMT")),
            employee_code: EmployeeCode(employee_code.to_string()),
            product: product.to_string(),
            quantity,
            amount,
            period: period.to_string(),
            status: CommitmentStatus::Open,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO commitment (id, employee_code, product, quantity, amount, period,
                status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&commitment.id.0)
        .bind(&commitment.employee_code.0)
        .bind(&commitment.product)
        .bind(commitment.quantity)
        .bind(commitment.amount)
        .bind(&commitment.period)
        .bind(commitment.status.as_str())
        .bind(commitment.created_at.to_rfc3339())
        .bind(commitment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, "commitment"))?;

        Ok(commitment)
    }

    pub async fn list(
        &self,
        employee_code: Option<&str>,
        period: Option<&str>,
    ) -> Result<Vec<Commitment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, employee_code, product, quantity, amount, period, status,
                    created_at, updated_at
             FROM commitment
             WHERE (? IS NULL OR employee_code = ?) AND (? IS NULL OR period = ?)
             ORDER BY period, employee_code, created_at",
        )
        .bind(employee_code)
        .bind(employee_code)
        .bind(period)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_commitment).collect()
    }

    pub async fn set_status(
        &self,
        id: &CommitmentId,
        status: CommitmentStatus,
    ) -> Result<Commitment, RepositoryError> {
        let result = sqlx::query("UPDATE commitment SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("commitment {}", id.0)));
        }

        let row = sqlx::query(
            "SELECT id, employee_code, product, quantity, amount, period, status,
                    created_at, updated_at
             FROM commitment WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_one(&self.pool)
        .await?;
        row_to_commitment(&row)
    }
}

fn row_to_commitment(row: &sqlx::sqlite::SqliteRow) -> Result<Commitment, RepositoryError> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Commitment {
        id: CommitmentId(row.try_get("id")?),
        employee_code: EmployeeCode(row.try_get("employee_code")?),
        product: row.try_get("product")?,
        quantity: row.try_get("quantity")?,
        amount: row.try_get("amount")?,
        period: row.try_get("period")?,
        status: CommitmentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("status: unknown `{status}`")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use fieldpulse_core::domain::commitment::{CommitmentId, CommitmentStatus};

    use super::SqlCommitmentRepository;
    use crate::repositories::{EmployeeDraft, RepositoryError, SqlEmployeeRepository};
    use crate::{connect_in_memory, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlEmployeeRepository::new(pool.clone())
            .create(
                "E-1",
                &EmployeeDraft {
                    name: "Asha".to_string(),
                    role: "BE".to_string(),
                    email: None,
                    territory_code: None,
                    parent_territory_code: None,
                    manager_code: None,
                    active: true,
                },
            )
            .await
            .expect("employee");
        pool
    }

    #[tokio::test]
    async fn new_commitments_start_open_and_can_be_closed() {
        let pool = setup().await;
        let repo = SqlCommitmentRepository::new(pool.clone());

        let created =
            repo.create("E-1", "ProductX", 10.0, 500.0, "2024-03").await.expect("create");
        assert_eq!(created.status, CommitmentStatus::Open);

        let achieved =
            repo.set_status(&created.id, CommitmentStatus::Achieved).await.expect("status");
        assert_eq!(achieved.status, CommitmentStatus::Achieved);
        assert_eq!(achieved.id, created.id);

        let listed = repo.list(Some("E-1"), Some("2024-03")).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, CommitmentStatus::Achieved);
        assert!(repo.list(None, Some("2024-04")).await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn status_change_on_missing_commitment_is_not_found() {
        let pool = setup().await;
        let repo = SqlCommitmentRepository::new(pool.clone());

        let error = repo
            .set_status(&CommitmentId("CMT-missing".to_string()), CommitmentStatus::Missed)
            .await
            .expect_err("missing");

        assert!(matches!(error, RepositoryError::NotFound(_)), "got {error:?}");
        pool.close().await;
    }
}
