use chrono::Utc;
use sqlx::Row;

use fieldpulse_core::domain::employee::EmployeeCode;
use fieldpulse_core::domain::escalation::{Escalation, EscalationId, EscalationStatus};

use super::{new_id, parse_timestamp, RepositoryError};
use crate::DbPool;

const ESCALATION_COLUMNS: &str =
    "id, employee_code, raised_by, subject, detail, status, created_at, updated_at";

pub struct SqlEscalationRepository {
    pool: DbPool,
}

impl SqlEscalationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        employee_code: &str,
        raised_by: &str,
        subject: &str,
        detail: &str,
    ) -> Result<Escalation, RepositoryError> {
        let now = Utc::now();
        let escalation = Escalation {
            id: EscalationId(new_id("ESC")),
            employee_code: EmployeeCode(employee_code.to_string()),
            raised_by: EmployeeCode(raised_by.to_string()),
            subject: subject.to_string(),
            detail: detail.to_string(),
            status: EscalationStatus::Open,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO escalation (id, employee_code, raised_by, subject, detail, status,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&escalation.id.0)
        .bind(&escalation.employee_code.0)
        .bind(&escalation.raised_by.0)
        .bind(&escalation.subject)
        .bind(&escalation.detail)
        .bind(escalation.status.as_str())
        .bind(escalation.created_at.to_rfc3339())
        .bind(escalation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, "escalation"))?;

        Ok(escalation)
    }

    pub async fn find(&self, id: &EscalationId) -> Result<Option<Escalation>, RepositoryError> {
        let sql = format!("SELECT {ESCALATION_COLUMNS} FROM escalation WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_escalation).transpose()
    }

    pub async fn list(
        &self,
        status: Option<EscalationStatus>,
        employee_code: Option<&str>,
    ) -> Result<Vec<Escalation>, RepositoryError> {
        let status = status.map(|status| status.as_str());
        let sql = format!(
            "SELECT {ESCALATION_COLUMNS} FROM escalation
             WHERE (? IS NULL OR status = ?) AND (? IS NULL OR employee_code = ?)
             ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(status)
            .bind(employee_code)
            .bind(employee_code)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_escalation).collect()
    }

    /// Moves an escalation from `expected` to `next`. A concurrent change of status in between
    /// surfaces as a conflict rather than being overwritten.
    pub async fn transition(
        &self,
        id: &EscalationId,
        expected: EscalationStatus,
        next: EscalationStatus,
    ) -> Result<Escalation, RepositoryError> {
        let result = sqlx::query(
            "UPDATE escalation SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find(id).await? {
                Some(_) => Err(RepositoryError::Conflict(format!(
                    "escalation {} is no longer {}",
                    id.0,
                    expected.as_str()
                ))),
                None => Err(RepositoryError::NotFound(format!("escalation {}", id.0))),
            };
        }

        self.find(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("escalation {}", id.0)))
    }
}

fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<Escalation, RepositoryError> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Escalation {
        id: EscalationId(row.try_get("id")?),
        employee_code: EmployeeCode(row.try_get("employee_code")?),
        raised_by: EmployeeCode(row.try_get("raised_by")?),
        subject: row.try_get("subject")?,
        detail: row.try_get("detail")?,
        status: EscalationStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("status: unknown `{status}`")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
