use chrono::{NaiveDate, Utc};
use sqlx::Row;

use fieldpulse_core::domain::employee::EmployeeCode;
use fieldpulse_core::domain::sales::{KpiScore, KpiScoreId, SaleEntry, SaleId, SalesMeasure};
use fieldpulse_core::report::PivotCell;

use super::{new_id, parse_date, parse_timestamp, RepositoryError};
use crate::DbPool;

/// Inclusive date range plus an optional employee restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SalesFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub employee_code: Option<String>,
}

impl SalesFilter {
    fn bounds(&self) -> (Option<String>, Option<String>) {
        (self.from.map(|date| date.to_string()), self.to.map(|date| date.to_string()))
    }
}

pub struct SqlSalesRepository {
    pool: DbPool,
}

impl SqlSalesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        employee_code: &str,
        product: &str,
        quantity: f64,
        amount: f64,
        sale_date: NaiveDate,
    ) -> Result<SaleEntry, RepositoryError> {
        let entry = SaleEntry {
            id: SaleId(new_id("SALE")),
            employee_code: EmployeeCode(employee_code.to_string()),
            product: product.to_string(),
            quantity,
            amount,
            sale_date,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO sale (id, employee_code, product, quantity, amount, sale_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.employee_code.0)
        .bind(&entry.product)
        .bind(entry.quantity)
        .bind(entry.amount)
        .bind(entry.sale_date.to_string())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, "sale"))?;

        Ok(entry)
    }

    pub async fn list(&self, filter: &SalesFilter) -> Result<Vec<SaleEntry>, RepositoryError> {
        let (from, to) = filter.bounds();
        let rows = sqlx::query(
            "SELECT id, employee_code, product, quantity, amount, sale_date, created_at
             FROM sale
             WHERE (? IS NULL OR sale_date >= ?)
               AND (? IS NULL OR sale_date <= ?)
               AND (? IS NULL OR employee_code = ?)
             ORDER BY sale_date, id",
        )
        .bind(from.as_deref())
        .bind(from.as_deref())
        .bind(to.as_deref())
        .bind(to.as_deref())
        .bind(filter.employee_code.as_deref())
        .bind(filter.employee_code.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_sale).collect()
    }

    /// Employee × product totals for the pivot report.
    pub async fn pivot_cells(
        &self,
        filter: &SalesFilter,
        measure: SalesMeasure,
    ) -> Result<Vec<PivotCell>, RepositoryError> {
        let (from, to) = filter.bounds();
        let column = match measure {
            SalesMeasure::Amount => "s.amount",
            SalesMeasure::Quantity => "s.quantity",
        };
        let sql = format!(
            "SELECT s.employee_code, e.name, s.product, SUM({column}) AS value
             FROM sale s
             JOIN employee e ON e.employee_code = s.employee_code
             WHERE (? IS NULL OR s.sale_date >= ?)
               AND (? IS NULL OR s.sale_date <= ?)
               AND (? IS NULL OR s.employee_code = ?)
             GROUP BY s.employee_code, e.name, s.product
             ORDER BY s.employee_code, s.product"
        );
        let rows = sqlx::query(&sql)
            .bind(from.as_deref())
            .bind(from.as_deref())
            .bind(to.as_deref())
            .bind(to.as_deref())
            .bind(filter.employee_code.as_deref())
            .bind(filter.employee_code.as_deref())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<PivotCell, RepositoryError> {
                let value: Option<f64> = row.try_get("value")?;
                Ok(PivotCell {
                    row_key: row.try_get("employee_code")?,
                    row_label: row.try_get("name")?,
                    column: row.try_get("product")?,
                    value: value.unwrap_or(0.0),
                })
            })
            .collect()
    }
}

fn row_to_sale(row: &sqlx::sqlite::SqliteRow) -> Result<SaleEntry, RepositoryError> {
    let sale_date: String = row.try_get("sale_date")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(SaleEntry {
        id: SaleId(row.try_get("id")?),
        employee_code: EmployeeCode(row.try_get("employee_code")?),
        product: row.try_get("product")?,
        quantity: row.try_get("quantity")?,
        amount: row.try_get("amount")?,
        sale_date: parse_date("sale_date", &sale_date)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

pub struct SqlKpiRepository {
    pool: DbPool,
}

impl SqlKpiRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        employee_code: &str,
        metric: &str,
        value: Option<f64>,
        period: &str,
    ) -> Result<KpiScore, RepositoryError> {
        let score = KpiScore {
            id: KpiScoreId(new_id("KPI")),
            employee_code: EmployeeCode(employee_code.to_string()),
            metric: metric.to_string(),
            value,
            period: period.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO kpi_score (id, employee_code, metric, value, period, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&score.id.0)
        .bind(&score.employee_code.0)
        .bind(&score.metric)
        .bind(score.value)
        .bind(&score.period)
        .bind(score.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, "kpi score"))?;

        Ok(score)
    }

    pub async fn list(
        &self,
        period: Option<&str>,
        employee_code: Option<&str>,
    ) -> Result<Vec<KpiScore>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, employee_code, metric, value, period, created_at
             FROM kpi_score
             WHERE (? IS NULL OR period = ?) AND (? IS NULL OR employee_code = ?)
             ORDER BY period, employee_code, metric",
        )
        .bind(period)
        .bind(period)
        .bind(employee_code)
        .bind(employee_code)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<KpiScore, RepositoryError> {
                let created_at: String = row.try_get("created_at")?;
                Ok(KpiScore {
                    id: KpiScoreId(row.try_get("id")?),
                    employee_code: EmployeeCode(row.try_get("employee_code")?),
                    metric: row.try_get("metric")?,
                    value: row.try_get("value")?,
                    period: row.try_get("period")?,
                    created_at: parse_timestamp("created_at", &created_at)?,
                })
            })
            .collect()
    }
}
