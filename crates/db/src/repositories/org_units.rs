use std::collections::{BTreeMap, HashMap};

use sqlx::Row;

use fieldpulse_core::domain::org_unit::{DetailRow, OrgUnit, RoleClass};
use fieldpulse_core::domain::sales::SalesMeasure;

use super::{HierarchyKeying, HierarchyQuery, HierarchyScope, OrgUnitSource, RepositoryError};
use crate::DbPool;

const TERRITORY_UNITS_ALL: &str = "SELECT employee_code, name, role,
        territory_code AS unit_key, parent_territory_code AS parent_key
     FROM employee
     WHERE active = 1 AND territory_code IS NOT NULL AND territory_code <> ''
     ORDER BY unit_key";

// UNION (not UNION ALL) so a cycle in stored parent codes terminates.
macro_rules! territory_subtree {
    () => {
        "WITH RECURSIVE subtree(code) AS (
            SELECT territory_code FROM employee WHERE territory_code = ? AND active = 1
            UNION
            SELECT e.territory_code FROM employee e
            JOIN subtree s ON e.parent_territory_code = s.code
            WHERE e.active = 1 AND e.territory_code IS NOT NULL
         ),
         members AS (
            SELECT e.employee_code FROM employee e
            JOIN subtree s ON e.territory_code = s.code
            WHERE e.active = 1
         ) "
    };
}

macro_rules! manager_subtree {
    () => {
        "WITH RECURSIVE subtree(code) AS (
            SELECT employee_code FROM employee WHERE employee_code = ? AND active = 1
            UNION
            SELECT e.employee_code FROM employee e
            JOIN subtree s ON e.manager_code = s.code
            WHERE e.active = 1
         ),
         members AS (
            SELECT code AS employee_code FROM subtree
         ) "
    };
}

const TERRITORY_UNITS_SUBTREE: &str = concat!(
    territory_subtree!(),
    "SELECT e.employee_code, e.name, e.role,
        e.territory_code AS unit_key, e.parent_territory_code AS parent_key
     FROM employee e
     JOIN members m ON e.employee_code = m.employee_code
     ORDER BY unit_key"
);

const MANAGER_UNITS_ALL: &str = "SELECT employee_code, name, role,
        employee_code AS unit_key, manager_code AS parent_key
     FROM employee
     WHERE active = 1
     ORDER BY unit_key";

const MANAGER_UNITS_SUBTREE: &str = concat!(
    manager_subtree!(),
    "SELECT e.employee_code, e.name, e.role,
        e.employee_code AS unit_key, e.manager_code AS parent_key
     FROM employee e
     JOIN members m ON e.employee_code = m.employee_code
     WHERE e.active = 1
     ORDER BY unit_key"
);

macro_rules! kpi_averages {
    ($scope:literal) => {
        concat!(
            "SELECT employee_code, metric, AVG(value) AS value
             FROM kpi_score
             WHERE (? IS NULL OR period = ?)",
            $scope,
            " GROUP BY employee_code, metric"
        )
    };
}

const KPI_AVERAGES_ALL: &str = kpi_averages!("");
const KPI_AVERAGES_TERRITORY_SUBTREE: &str = concat!(
    territory_subtree!(),
    kpi_averages!(" AND employee_code IN (SELECT employee_code FROM members)")
);
const KPI_AVERAGES_MANAGER_SUBTREE: &str = concat!(
    manager_subtree!(),
    kpi_averages!(" AND employee_code IN (SELECT employee_code FROM members)")
);

macro_rules! sale_totals {
    ($column:literal, $scope:literal) => {
        concat!(
            "SELECT employee_code, product, SUM(",
            $column,
            ") AS value
             FROM sale
             WHERE (? IS NULL OR sale_date >= ?) AND (? IS NULL OR sale_date <= ?)",
            $scope,
            " GROUP BY employee_code, product
             ORDER BY employee_code, product"
        )
    };
}

macro_rules! sale_totals_by_scope {
    ($column:literal) => {
        [
            sale_totals!($column, ""),
            concat!(
                territory_subtree!(),
                sale_totals!($column, " AND employee_code IN (SELECT employee_code FROM members)")
            ),
            concat!(
                manager_subtree!(),
                sale_totals!($column, " AND employee_code IN (SELECT employee_code FROM members)")
            ),
        ]
    };
}

const SALE_AMOUNTS: [&str; 3] = sale_totals_by_scope!("amount");
const SALE_QUANTITIES: [&str; 3] = sale_totals_by_scope!("quantity");

pub struct SqlOrgUnitSource {
    pool: DbPool,
}

impl SqlOrgUnitSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_unit_rows(
        &self,
        query: &HierarchyQuery,
    ) -> Result<Vec<sqlx::sqlite::SqliteRow>, sqlx::Error> {
        match (&query.scope, query.keying) {
            (HierarchyScope::All, HierarchyKeying::Territory) => {
                sqlx::query(TERRITORY_UNITS_ALL).fetch_all(&self.pool).await
            }
            (HierarchyScope::All, HierarchyKeying::Manager) => {
                sqlx::query(MANAGER_UNITS_ALL).fetch_all(&self.pool).await
            }
            (HierarchyScope::Root(root), HierarchyKeying::Territory) => {
                sqlx::query(TERRITORY_UNITS_SUBTREE).bind(root).fetch_all(&self.pool).await
            }
            (HierarchyScope::Root(root), HierarchyKeying::Manager) => {
                sqlx::query(MANAGER_UNITS_SUBTREE).bind(root).fetch_all(&self.pool).await
            }
        }
    }

    async fn fetch_metric_rows(
        &self,
        query: &HierarchyQuery,
    ) -> Result<Vec<sqlx::sqlite::SqliteRow>, sqlx::Error> {
        let period = query.period.as_deref();
        let sql = match (&query.scope, query.keying) {
            (HierarchyScope::All, _) => KPI_AVERAGES_ALL,
            (HierarchyScope::Root(_), HierarchyKeying::Territory) => KPI_AVERAGES_TERRITORY_SUBTREE,
            (HierarchyScope::Root(_), HierarchyKeying::Manager) => KPI_AVERAGES_MANAGER_SUBTREE,
        };
        scoped(sqlx::query(sql), &query.scope)
            .bind(period)
            .bind(period)
            .fetch_all(&self.pool)
            .await
    }

    async fn fetch_detail_rows(
        &self,
        query: &HierarchyQuery,
    ) -> Result<Vec<sqlx::sqlite::SqliteRow>, sqlx::Error> {
        let from = query.from.map(|date| date.to_string());
        let to = query.to.map(|date| date.to_string());
        scoped(sqlx::query(detail_sql(query)), &query.scope)
            .bind(from.as_deref())
            .bind(from.as_deref())
            .bind(to.as_deref())
            .bind(to.as_deref())
            .fetch_all(&self.pool)
            .await
    }
}

/// Binds the subtree root first; the scoped statements open with the subtree CTE.
fn scoped<'q>(
    statement: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    scope: &'q HierarchyScope,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match scope {
        HierarchyScope::All => statement,
        HierarchyScope::Root(root) => statement.bind(root.as_str()),
    }
}

fn detail_sql(query: &HierarchyQuery) -> &'static str {
    let by_scope = match query.measure {
        SalesMeasure::Amount => &SALE_AMOUNTS,
        SalesMeasure::Quantity => &SALE_QUANTITIES,
    };
    match (&query.scope, query.keying) {
        (HierarchyScope::All, _) => by_scope[0],
        (HierarchyScope::Root(_), HierarchyKeying::Territory) => by_scope[1],
        (HierarchyScope::Root(_), HierarchyKeying::Manager) => by_scope[2],
    }
}

#[async_trait::async_trait]
impl OrgUnitSource for SqlOrgUnitSource {
    async fn fetch_units(&self, query: &HierarchyQuery) -> Result<Vec<OrgUnit>, RepositoryError> {
        let (unit_rows, metric_rows, detail_rows) = tokio::try_join!(
            self.fetch_unit_rows(query),
            self.fetch_metric_rows(query),
            self.fetch_detail_rows(query),
        )?;

        let mut metrics: HashMap<String, BTreeMap<String, Option<f64>>> = HashMap::new();
        for row in &metric_rows {
            let employee_code: String = row.try_get("employee_code")?;
            let metric: String = row.try_get("metric")?;
            let value: Option<f64> = row.try_get("value")?;
            metrics.entry(employee_code).or_default().insert(metric, value);
        }

        let mut details: HashMap<String, Vec<DetailRow>> = HashMap::new();
        for row in &detail_rows {
            let employee_code: String = row.try_get("employee_code")?;
            let category: String = row.try_get("product")?;
            let value: Option<f64> = row.try_get("value")?;
            details.entry(employee_code).or_default().push(DetailRow { category, value });
        }

        let mut units = Vec::with_capacity(unit_rows.len());
        for row in &unit_rows {
            let employee_code: String = row.try_get("employee_code")?;
            let role: String = row.try_get("role")?;
            units.push(OrgUnit {
                key: row.try_get("unit_key")?,
                parent_key: row.try_get("parent_key")?,
                display_name: row.try_get("name")?,
                role_class: RoleClass::new(role),
                raw_metrics: metrics.remove(&employee_code).unwrap_or_default(),
                leaf_detail_rows: details.remove(&employee_code).unwrap_or_default(),
            });
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use fieldpulse_core::domain::sales::SalesMeasure;
    use sqlx::Row;

    use super::SqlOrgUnitSource;
    use crate::repositories::{HierarchyKeying, HierarchyQuery, HierarchyScope, OrgUnitSource};
    use crate::{connect_in_memory, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = "2024-01-01T00:00:00+00:00";
        let employees = [
            ("E-RSM", "Rita", "RSM", Some("T-R"), None, None),
            ("E-ASM", "Arun", "ASM", Some("T-A"), Some("T-R"), Some("E-RSM")),
            ("E-BE1", "Bea", "BE", Some("T-A1"), Some("T-A"), Some("E-ASM")),
            ("E-BE2", "Ben", "BE", Some("T-A2"), Some("T-A"), Some("E-ASM")),
            ("E-KAE", "Kai", "KAE", None, None, Some("E-RSM")),
        ];
        for (code, name, role, territory, parent, manager) in employees {
            sqlx::query(
                "INSERT INTO employee (employee_code, name, role, territory_code,
                    parent_territory_code, manager_code, active, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
            )
            .bind(code)
            .bind(name)
            .bind(role)
            .bind(territory)
            .bind(parent)
            .bind(manager)
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .expect("seed employee");
        }

        let scores = [
            ("K1", "E-BE1", "coverage", Some(80.0), "2024-03"),
            ("K2", "E-BE1", "coverage", Some(90.0), "2024-03"),
            ("K3", "E-BE2", "coverage", Some(60.0), "2024-03"),
            ("K4", "E-BE2", "coverage", Some(10.0), "2024-02"),
            ("K5", "E-BE2", "calls", None, "2024-03"),
            ("K6", "E-KAE", "coverage", Some(70.0), "2024-03"),
        ];
        for (id, code, metric, value, period) in scores {
            sqlx::query(
                "INSERT INTO kpi_score (id, employee_code, metric, value, period, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(code)
            .bind(metric)
            .bind(value)
            .bind(period)
            .bind(now)
            .execute(&pool)
            .await
            .expect("seed kpi");
        }

        let sales = [
            ("S1", "E-BE1", "ProductX", 2.0, 10.0, "2024-03-05"),
            ("S2", "E-BE1", "ProductX", 1.0, 5.0, "2024-03-20"),
            ("S3", "E-BE2", "ProductY", 4.0, 8.0, "2024-03-07"),
            ("S4", "E-BE2", "ProductY", 9.0, 90.0, "2024-04-01"),
            ("S5", "E-KAE", "ProductZ", 3.0, 30.0, "2024-03-11"),
        ];
        for (id, code, product, quantity, amount, date) in sales {
            sqlx::query(
                "INSERT INTO sale (id, employee_code, product, quantity, amount, sale_date, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(code)
            .bind(product)
            .bind(quantity)
            .bind(amount)
            .bind(date)
            .bind(now)
            .execute(&pool)
            .await
            .expect("seed sale");
        }

        pool
    }

    fn march() -> HierarchyQuery {
        HierarchyQuery {
            period: Some("2024-03".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..HierarchyQuery::default()
        }
    }

    #[tokio::test]
    async fn territory_subtree_fetch_is_closed_under_parent_relation() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());

        let units = source
            .fetch_units(&HierarchyQuery {
                scope: HierarchyScope::Root("T-A".to_string()),
                ..march()
            })
            .await
            .expect("fetch");

        let keys: Vec<&str> = units.iter().map(|unit| unit.key.as_str()).collect();
        assert_eq!(keys, vec!["T-A", "T-A1", "T-A2"]);

        let bea = units.iter().find(|unit| unit.key == "T-A1").expect("bea");
        assert_eq!(bea.parent_key.as_deref(), Some("T-A"));
        assert_eq!(bea.raw_metrics["coverage"], Some(85.0));
        assert_eq!(bea.leaf_detail_rows.len(), 1);
        assert_eq!(bea.leaf_detail_rows[0].value, Some(15.0));

        pool.close().await;
    }

    #[tokio::test]
    async fn rooted_fetch_reads_scores_and_sales_only_inside_the_subtree() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());
        let employee_codes = |rows: Vec<sqlx::sqlite::SqliteRow>| {
            rows.iter()
                .map(|row| row.get::<String, _>("employee_code"))
                .collect::<BTreeSet<_>>()
        };

        let area = HierarchyQuery { scope: HierarchyScope::Root("T-A".to_string()), ..march() };
        let metrics = source.fetch_metric_rows(&area).await.expect("metrics");
        let details = source.fetch_detail_rows(&area).await.expect("details");
        assert_eq!(employee_codes(metrics), BTreeSet::from(["E-BE1".to_string(), "E-BE2".to_string()]));
        assert_eq!(employee_codes(details), BTreeSet::from(["E-BE1".to_string(), "E-BE2".to_string()]));

        let reports = HierarchyQuery {
            scope: HierarchyScope::Root("E-ASM".to_string()),
            keying: HierarchyKeying::Manager,
            ..march()
        };
        let metrics = source.fetch_metric_rows(&reports).await.expect("metrics");
        assert!(!employee_codes(metrics).contains("E-KAE"));

        let everyone = source.fetch_metric_rows(&march()).await.expect("metrics");
        assert!(employee_codes(everyone).contains("E-KAE"));

        pool.close().await;
    }

    #[tokio::test]
    async fn territory_keying_skips_employees_without_territory() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());

        let units = source.fetch_units(&march()).await.expect("fetch");

        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|unit| unit.key.starts_with("T-")));

        pool.close().await;
    }

    #[tokio::test]
    async fn manager_keying_links_by_reporting_line() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());

        let units = source
            .fetch_units(&HierarchyQuery {
                scope: HierarchyScope::Root("E-RSM".to_string()),
                keying: HierarchyKeying::Manager,
                ..march()
            })
            .await
            .expect("fetch");

        assert_eq!(units.len(), 5);
        let kai = units.iter().find(|unit| unit.key == "E-KAE").expect("kai");
        assert_eq!(kai.parent_key.as_deref(), Some("E-RSM"));

        pool.close().await;
    }

    #[tokio::test]
    async fn null_scores_and_measure_selection_are_preserved() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());

        let units = source
            .fetch_units(&HierarchyQuery { measure: SalesMeasure::Quantity, ..march() })
            .await
            .expect("fetch");

        let ben = units.iter().find(|unit| unit.key == "T-A2").expect("ben");
        assert_eq!(ben.raw_metrics["calls"], None);
        assert_eq!(ben.raw_metrics["coverage"], Some(60.0));
        assert_eq!(ben.leaf_detail_rows[0].value, Some(4.0));

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_root_returns_no_rows() {
        let pool = setup().await;
        let source = SqlOrgUnitSource::new(pool.clone());

        let units = source
            .fetch_units(&HierarchyQuery {
                scope: HierarchyScope::Root("T-NOPE".to_string()),
                ..HierarchyQuery::default()
            })
            .await
            .expect("fetch");

        assert!(units.is_empty());
        pool.close().await;
    }
}
