//! JSON API for the field force reporting backend.
//!
//! - `GET  /api/v1/hierarchy`                   : aggregated org tree (detached roots)
//! - `GET  /api/v1/hierarchy/{root}`            : aggregated subtree under one unit
//! - `GET|POST /api/v1/employees`               : list / create employees
//! - `GET|PUT  /api/v1/employees/{code}`        : fetch / replace one employee
//! - `GET  /api/v1/employees/{code}/role`       : flat role lookup
//! - `GET|POST /api/v1/sales`                   : list / record sales
//! - `GET  /api/v1/sales/pivot`                 : employee × product pivot
//! - `GET|POST /api/v1/kpi-scores`              : list / record KPI scores
//! - `GET|POST /api/v1/commitments`, `PUT /api/v1/commitments/{id}/status`
//! - `GET|POST /api/v1/escalations`, `PUT /api/v1/escalations/{id}/status`
//! - `GET|POST /api/v1/messages`                : informational messages

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use fieldpulse_core::config::CorsConfig;
use fieldpulse_core::errors::{ApplicationError, DomainError, InterfaceError};
use fieldpulse_core::hierarchy::HierarchyOptions;
use fieldpulse_db::{DbPool, OrgUnitSource, RepositoryError, SqlOrgUnitSource};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, warn};
use uuid::Uuid;

pub mod commitments;
pub mod employees;
pub mod escalations;
pub mod hierarchy;
pub mod messages;
pub mod sales;

#[derive(Clone)]
pub struct ApiState {
    pub db_pool: DbPool,
    pub source: Arc<dyn OrgUnitSource>,
    pub hierarchy: HierarchyOptions,
}

impl ApiState {
    pub fn new(db_pool: DbPool, hierarchy: HierarchyOptions) -> Self {
        let source = Arc::new(SqlOrgUnitSource::new(db_pool.clone()));
        Self { db_pool, source, hierarchy }
    }

    pub fn with_source(mut self, source: Arc<dyn OrgUnitSource>) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub type ApiError = (StatusCode, Json<ApiErrorBody>);

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/hierarchy", get(hierarchy::hierarchy))
        .route("/api/v1/hierarchy/{root}", get(hierarchy::hierarchy_for_root))
        .route("/api/v1/employees", get(employees::list_employees).post(employees::create_employee))
        .route("/api/v1/employees/{code}", get(employees::get_employee).put(employees::update_employee))
        .route("/api/v1/employees/{code}/role", get(employees::employee_role))
        .route("/api/v1/sales", get(sales::list_sales).post(sales::record_sale))
        .route("/api/v1/sales/pivot", get(sales::sales_pivot))
        .route("/api/v1/kpi-scores", get(sales::list_kpi_scores).post(sales::record_kpi_score))
        .route(
            "/api/v1/commitments",
            get(commitments::list_commitments).post(commitments::create_commitment),
        )
        .route("/api/v1/commitments/{id}/status", put(commitments::update_commitment_status))
        .route(
            "/api/v1/escalations",
            get(escalations::list_escalations).post(escalations::create_escalation),
        )
        .route("/api/v1/escalations/{id}/status", put(escalations::update_escalation_status))
        .route("/api/v1/messages", get(messages::list_messages).post(messages::create_message))
        .with_state(state)
}

/// API and health routes with CORS applied. An empty origin list leaves CORS off.
pub fn app(state: ApiState, cors: &CorsConfig) -> Router {
    let app = router(state.clone()).merge(crate::health::router(state.db_pool));
    match cors_layer(cors) {
        Some(layer) => app.layer(layer),
        None => app,
    }
}

fn cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if cors.allowed_origins.is_empty() {
        return None;
    }
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if cors.allowed_origins.iter().any(|origin| origin == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(
                    event_name = "api.cors.origin_skipped",
                    correlation_id = "bootstrap",
                    origin = %origin,
                    error = %error,
                    "skipping CORS origin that is not a valid header value"
                );
                None
            }
        })
        .collect::<Vec<_>>();
    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

pub(crate) fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Maps an application error onto the HTTP status and caller-safe body. Server-side failures
/// are logged with their detail since the body never carries it.
pub(crate) fn reject(error: ApplicationError, correlation_id: &str) -> ApiError {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            error = %interface,
            "request failed"
        );
    }

    (
        status,
        Json(ApiErrorBody {
            error: interface.user_message(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

pub(crate) fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    reject(ApplicationError::Domain(DomainError::InvalidInput(message.into())), correlation_id)
}

pub(crate) fn storage_error(error: RepositoryError, correlation_id: &str) -> ApiError {
    let mapped = match error {
        RepositoryError::NotFound(message) => ApplicationError::NotFound(message),
        RepositoryError::Conflict(message) => ApplicationError::Conflict(message),
        other => ApplicationError::Persistence(other.to_string()),
    };
    reject(mapped, correlation_id)
}

/// Trimmed value of a required text field.
pub(crate) fn required(field: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(value.to_string())
}

/// Trimmed optional text with blanks folded to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

pub(crate) fn parse_date_param(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("{field} must be a date in YYYY-MM-DD form, got `{raw}`")),
    }
}

pub(crate) fn parse_date_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let from = parse_date_param("from", from)?;
    let to = parse_date_param("to", to)?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(format!("from ({from}) must not be after to ({to})"));
        }
    }
    Ok((from, to))
}

pub(crate) fn non_negative(field: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a non-negative number"));
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod test_support {
    use fieldpulse_core::hierarchy::HierarchyOptions;
    use fieldpulse_db::{connect_in_memory, migrations, SeedDataset};

    use super::ApiState;

    pub async fn seeded_state() -> ApiState {
        let pool = connect_in_memory().await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("seed");
        ApiState::new(pool, HierarchyOptions::default())
    }

    pub async fn empty_state() -> ApiState {
        let pool = connect_in_memory().await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        ApiState::new(pool, HierarchyOptions::default())
    }
}
