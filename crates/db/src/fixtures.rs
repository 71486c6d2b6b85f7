use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Seeded employees and where each one sits in the territory tree.
const SEED_EMPLOYEES: &[SeedEmployee] = &[
    SeedEmployee { code: "E-100", role: "RSM", territory: Some("T-RSM-N"), parent: None },
    SeedEmployee { code: "E-110", role: "ASM", territory: Some("T-ASM-N1"), parent: Some("T-RSM-N") },
    SeedEmployee { code: "E-120", role: "ASM", territory: Some("T-ASM-N2"), parent: Some("T-RSM-N") },
    SeedEmployee { code: "E-111", role: "BE", territory: Some("T-BE-N11"), parent: Some("T-ASM-N1") },
    SeedEmployee { code: "E-112", role: "BE", territory: Some("T-BE-N12"), parent: Some("T-ASM-N1") },
    SeedEmployee { code: "E-121", role: "KAE", territory: Some("T-KAE-N21"), parent: Some("T-ASM-N2") },
    SeedEmployee { code: "E-122", role: "TE", territory: Some("T-TE-N22"), parent: Some("T-ASM-N2") },
    SeedEmployee { code: "E-123", role: "BE", territory: Some("T-BE-N23"), parent: Some("T-ASM-N2") },
    SeedEmployee { code: "E-130", role: "NE", territory: Some("T-NE-N3"), parent: Some("T-RSM-N") },
    SeedEmployee { code: "E-199", role: "BE", territory: None, parent: None },
];

const SEED_KPI_SCORE_COUNT: i64 = 18;
const SEED_SALE_COUNT: i64 = 8;
const SEED_COMMITMENT_IDS: &[&str] = &["CMT-SEED-001", "CMT-SEED-002"];
const SEED_ESCALATION_IDS: &[&str] = &["ESC-SEED-001"];
const SEED_MESSAGE_IDS: &[&str] = &["MSG-SEED-001"];

/// Root territory of the seeded organisation.
pub const SEED_ROOT_TERRITORY: &str = "T-RSM-N";
/// KPI period covered by the seeded scores.
pub const SEED_PERIOD: &str = "2024-03";

/// Deterministic demo organisation: a region, two areas and six field staff with one month of
/// KPI scores and sales.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/fieldpulse_seed.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            employees: SEED_EMPLOYEES.iter().map(|employee| employee.code).collect(),
            root_territory: SEED_ROOT_TERRITORY,
            period: SEED_PERIOD,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for employee in SEED_EMPLOYEES {
            let placed: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM employee
                    WHERE employee_code = ?1 AND role = ?2
                      AND territory_code IS ?3 AND parent_territory_code IS ?4)",
            )
            .bind(employee.code)
            .bind(employee.role)
            .bind(employee.territory)
            .bind(employee.parent)
            .fetch_one(pool)
            .await?;
            checks.push((employee.code, placed == 1));
        }

        let kpi_scores: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM kpi_score WHERE id LIKE 'KPI-SEED-%'")
                .fetch_one(pool)
                .await?;
        checks.push(("kpi-scores", kpi_scores == SEED_KPI_SCORE_COUNT));

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM sale WHERE id LIKE 'SALE-SEED-%'")
            .fetch_one(pool)
            .await?;
        checks.push(("sales", sales == SEED_SALE_COUNT));

        checks.push(("commitments", count_ids(pool, "commitment", SEED_COMMITMENT_IDS).await?));
        checks.push(("escalations", count_ids(pool, "escalation", SEED_ESCALATION_IDS).await?));
        checks.push(("messages", count_ids(pool, "info_message", SEED_MESSAGE_IDS).await?));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows; dependents first because of the employee foreign keys.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for table in ["kpi_score", "sale", "commitment", "escalation", "info_message"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE id LIKE '%-SEED-%'"))
                .execute(&mut *tx)
                .await?;
        }
        let codes = sql_array_from_ids(
            &SEED_EMPLOYEES.iter().map(|employee| employee.code).collect::<Vec<_>>(),
        );
        sqlx::query(&format!("DELETE FROM employee WHERE employee_code IN {codes}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<bool, RepositoryError> {
    let quoted = sql_array_from_ids(ids);
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
        .fetch_one(pool)
        .await?;
    Ok(count == ids.len() as i64)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy)]
struct SeedEmployee {
    code: &'static str,
    role: &'static str,
    territory: Option<&'static str>,
    parent: Option<&'static str>,
}

#[derive(Debug)]
pub struct SeedResult {
    pub employees: Vec<&'static str>,
    pub root_territory: &'static str,
    pub period: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_in_memory, migrations};

    #[test]
    fn sql_fixture_covers_every_seeded_employee() {
        for employee in SEED_EMPLOYEES {
            assert!(SeedDataset::SQL.contains(employee.code), "{} missing", employee.code);
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = connect_in_memory().await.expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = SeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = SeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.employees.len(), SEED_EMPLOYEES.len());

        SeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = SeedDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        pool.close().await;
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_in_memory().await.expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        SeedDataset::clean(&pool).await.expect("clean");

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM employee")
            .fetch_one(&pool)
            .await
            .expect("count employees");
        assert_eq!(remaining, 0);
        assert!(!SeedDataset::verify(&pool).await.expect("verify").all_present);

        pool.close().await;
    }
}
