use chrono::Utc;
use sqlx::Row;

use fieldpulse_core::domain::employee::{Employee, EmployeeCode, TerritoryCode};

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

const EMPLOYEE_COLUMNS: &str = "employee_code, name, role, email, territory_code,
    parent_territory_code, manager_code, active, created_at, updated_at";

/// Writable fields of an employee; the code is the identity and never changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmployeeDraft {
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub territory_code: Option<String>,
    pub parent_territory_code: Option<String>,
    pub manager_code: Option<String>,
    pub active: bool,
}

pub struct SqlEmployeeRepository {
    pool: DbPool,
}

impl SqlEmployeeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, role: Option<&str>) -> Result<Vec<Employee>, RepositoryError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employee
             WHERE (? IS NULL OR role = ? COLLATE NOCASE)
             ORDER BY employee_code"
        );
        let rows = sqlx::query(&sql).bind(role).bind(role).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_employee).collect()
    }

    pub async fn find(&self, code: &str) -> Result<Option<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee WHERE employee_code = ?");
        let row = sqlx::query(&sql).bind(code).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_employee).transpose()
    }

    pub async fn create(
        &self,
        code: &str,
        draft: &EmployeeDraft,
    ) -> Result<Employee, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO employee (employee_code, name, role, email, territory_code,
                parent_territory_code, manager_code, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(code)
        .bind(&draft.name)
        .bind(&draft.role)
        .bind(&draft.email)
        .bind(&draft.territory_code)
        .bind(&draft.parent_territory_code)
        .bind(&draft.manager_code)
        .bind(draft.active)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, &format!("employee {code}")))?;

        self.require(code).await
    }

    pub async fn update(
        &self,
        code: &str,
        draft: &EmployeeDraft,
    ) -> Result<Employee, RepositoryError> {
        let result = sqlx::query(
            "UPDATE employee SET name = ?, role = ?, email = ?, territory_code = ?,
                parent_territory_code = ?, manager_code = ?, active = ?, updated_at = ?
             WHERE employee_code = ?",
        )
        .bind(&draft.name)
        .bind(&draft.role)
        .bind(&draft.email)
        .bind(&draft.territory_code)
        .bind(&draft.parent_territory_code)
        .bind(&draft.manager_code)
        .bind(draft.active)
        .bind(Utc::now().to_rfc3339())
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, &format!("employee {code}")))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("employee {code}")));
        }
        self.require(code).await
    }

    /// Flat role lookup used by clients that only need to know what an employee is.
    pub async fn role_of(&self, code: &str) -> Result<Option<String>, RepositoryError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM employee WHERE employee_code = ?")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(role)
    }

    async fn require(&self, code: &str) -> Result<Employee, RepositoryError> {
        self.find(code).await?.ok_or_else(|| RepositoryError::NotFound(format!("employee {code}")))
    }
}

fn row_to_employee(row: &sqlx::sqlite::SqliteRow) -> Result<Employee, RepositoryError> {
    let code: String = row.try_get("employee_code")?;
    let territory_code: Option<String> = row.try_get("territory_code")?;
    let parent_territory_code: Option<String> = row.try_get("parent_territory_code")?;
    let manager_code: Option<String> = row.try_get("manager_code")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Employee {
        code: EmployeeCode(code),
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        email: row.try_get("email")?,
        territory_code: territory_code.map(TerritoryCode),
        parent_territory_code: parent_territory_code.map(TerritoryCode),
        manager_code: manager_code.map(EmployeeCode),
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{EmployeeDraft, SqlEmployeeRepository};
    use crate::repositories::RepositoryError;
    use crate::{connect_in_memory, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn draft(name: &str, role: &str, territory: &str) -> EmployeeDraft {
        EmployeeDraft {
            name: name.to_string(),
            role: role.to_string(),
            email: None,
            territory_code: Some(territory.to_string()),
            parent_territory_code: None,
            manager_code: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn create_then_find_returns_the_employee() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool.clone());

        let created = repo.create("E-1", &draft("Asha", "BE", "T-1")).await.expect("create");
        let found = repo.find("E-1").await.expect("find").expect("present");

        assert_eq!(created, found);
        assert_eq!(found.territory_code.map(|code| code.0).as_deref(), Some("T-1"));
        assert!(found.active);

        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool.clone());

        repo.create("E-1", &draft("Asha", "BE", "T-1")).await.expect("create");
        let error = repo.create("E-1", &draft("Other", "BE", "T-2")).await.expect_err("dup");

        assert!(matches!(error, RepositoryError::Conflict(_)), "got {error:?}");
        pool.close().await;
    }

    #[tokio::test]
    async fn update_of_missing_employee_is_not_found() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool.clone());

        let error = repo.update("E-404", &draft("Ghost", "BE", "T-9")).await.expect_err("missing");

        assert!(matches!(error, RepositoryError::NotFound(_)), "got {error:?}");
        pool.close().await;
    }

    #[tokio::test]
    async fn list_filters_by_role_case_insensitively() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool.clone());

        repo.create("E-1", &draft("Asha", "BE", "T-1")).await.expect("create");
        repo.create("E-2", &draft("Ravi", "ASM", "T-2")).await.expect("create");

        let leaves = repo.list(Some("be")).await.expect("list");
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].code.0, "E-1");
        assert_eq!(repo.list(None).await.expect("list all").len(), 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn update_changes_role_and_role_lookup_follows() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool.clone());

        repo.create("E-1", &draft("Asha", "BE", "T-1")).await.expect("create");
        let updated = repo.update("E-1", &draft("Asha", "ASM", "T-1")).await.expect("update");

        assert_eq!(updated.role, "ASM");
        assert_eq!(repo.role_of("E-1").await.expect("role").as_deref(), Some("ASM"));
        assert_eq!(repo.role_of("E-404").await.expect("role"), None);

        pool.close().await;
    }
}
