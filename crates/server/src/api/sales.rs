use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use fieldpulse_core::domain::sales::{is_valid_period, KpiScore, SaleEntry, SalesMeasure};
use fieldpulse_core::report::{pivot_sales, SalesPivot};
use fieldpulse_db::repositories::{SalesFilter, SqlKpiRepository, SqlSalesRepository};
use serde::Deserialize;
use tracing::info;

use super::{
    bad_request, new_correlation_id, non_blank, non_negative, parse_date_param, parse_date_range,
    required, storage_error,
};
use super::{ApiError, ApiState};

#[derive(Debug, Default, Deserialize)]
pub struct SalesParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub employee_code: Option<String>,
    pub measure: Option<String>,
}

impl SalesParams {
    fn filter(&self) -> Result<SalesFilter, String> {
        let (from, to) = parse_date_range(self.from.as_deref(), self.to.as_deref())?;
        Ok(SalesFilter { from, to, employee_code: non_blank(self.employee_code.as_deref()) })
    }
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub employee_code: String,
    pub product: String,
    pub quantity: f64,
    pub amount: f64,
    pub sale_date: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct KpiParams {
    pub period: Option<String>,
    pub employee_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KpiScoreRequest {
    pub employee_code: String,
    pub metric: String,
    pub value: Option<f64>,
    pub period: String,
}

pub async fn list_sales(
    State(state): State<ApiState>,
    Query(params): Query<SalesParams>,
) -> Result<Json<Vec<SaleEntry>>, ApiError> {
    let correlation_id = new_correlation_id();
    let filter = params.filter().map_err(|message| bad_request(message, &correlation_id))?;

    let sales = SqlSalesRepository::new(state.db_pool.clone())
        .list(&filter)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(sales))
}

pub async fn record_sale(
    State(state): State<ApiState>,
    Json(body): Json<SaleRequest>,
) -> Result<(StatusCode, Json<SaleEntry>), ApiError> {
    let correlation_id = new_correlation_id();
    let sale = validate_sale(&body).map_err(|message| bad_request(message, &correlation_id))?;

    let recorded = SqlSalesRepository::new(state.db_pool.clone())
        .record(&sale.employee_code, &sale.product, sale.quantity, sale.amount, sale.sale_date)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.sale.recorded",
        correlation_id = %correlation_id,
        sale_id = %recorded.id.0,
        employee_code = %recorded.employee_code.0,
        "sale recorded"
    );
    Ok((StatusCode::CREATED, Json(recorded)))
}

struct ValidSale {
    employee_code: String,
    product: String,
    quantity: f64,
    amount: f64,
    sale_date: NaiveDate,
}

fn validate_sale(body: &SaleRequest) -> Result<ValidSale, String> {
    Ok(ValidSale {
        employee_code: required("employee_code", &body.employee_code)?,
        product: required("product", &body.product)?,
        quantity: non_negative("quantity", body.quantity)?,
        amount: non_negative("amount", body.amount)?,
        sale_date: parse_date_param("sale_date", Some(&body.sale_date))?
            .ok_or_else(|| "sale_date is required".to_string())?,
    })
}

pub async fn sales_pivot(
    State(state): State<ApiState>,
    Query(params): Query<SalesParams>,
) -> Result<Json<SalesPivot>, ApiError> {
    let correlation_id = new_correlation_id();
    let filter = params.filter().map_err(|message| bad_request(message, &correlation_id))?;
    let measure = match non_blank(params.measure.as_deref()) {
        None => SalesMeasure::default(),
        Some(raw) => SalesMeasure::parse(&raw).ok_or_else(|| {
            bad_request(format!("unknown measure `{raw}` (expected amount|quantity)"), &correlation_id)
        })?,
    };

    let cells = SqlSalesRepository::new(state.db_pool.clone())
        .pivot_cells(&filter, measure)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(pivot_sales(&cells)))
}

pub async fn list_kpi_scores(
    State(state): State<ApiState>,
    Query(params): Query<KpiParams>,
) -> Result<Json<Vec<KpiScore>>, ApiError> {
    let correlation_id = new_correlation_id();
    let period = non_blank(params.period.as_deref());
    if let Some(period) = &period {
        if !is_valid_period(period) {
            return Err(bad_request(format!("period must be YYYY-MM, got `{period}`"), &correlation_id));
        }
    }
    let employee_code = non_blank(params.employee_code.as_deref());

    let scores = SqlKpiRepository::new(state.db_pool.clone())
        .list(period.as_deref(), employee_code.as_deref())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(scores))
}

pub async fn record_kpi_score(
    State(state): State<ApiState>,
    Json(body): Json<KpiScoreRequest>,
) -> Result<(StatusCode, Json<KpiScore>), ApiError> {
    let correlation_id = new_correlation_id();
    let employee_code = required("employee_code", &body.employee_code)
        .map_err(|message| bad_request(message, &correlation_id))?;
    let metric =
        required("metric", &body.metric).map_err(|message| bad_request(message, &correlation_id))?;
    let period = body.period.trim();
    if !is_valid_period(period) {
        return Err(bad_request(format!("period must be YYYY-MM, got `{period}`"), &correlation_id));
    }
    if body.value.is_some_and(|value| !value.is_finite()) {
        return Err(bad_request("value must be a finite number", &correlation_id));
    }

    let score = SqlKpiRepository::new(state.db_pool.clone())
        .record(&employee_code, &metric, body.value, period)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.kpi_score.recorded",
        correlation_id = %correlation_id,
        employee_code = %employee_code,
        metric = %metric,
        period = %period,
        "kpi score recorded"
    );
    Ok((StatusCode::CREATED, Json(score)))
}
