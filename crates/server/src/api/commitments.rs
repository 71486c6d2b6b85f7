use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fieldpulse_core::domain::commitment::{Commitment, CommitmentId, CommitmentStatus};
use fieldpulse_core::domain::sales::is_valid_period;
use fieldpulse_db::repositories::SqlCommitmentRepository;
use serde::Deserialize;
use tracing::info;

use super::{bad_request, new_correlation_id, non_blank, non_negative, required, storage_error};
use super::{ApiError, ApiState};

#[derive(Debug, Default, Deserialize)]
pub struct CommitmentParams {
    pub employee_code: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitmentRequest {
    pub employee_code: String,
    pub product: String,
    pub quantity: f64,
    pub amount: f64,
    pub period: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn list_commitments(
    State(state): State<ApiState>,
    Query(params): Query<CommitmentParams>,
) -> Result<Json<Vec<Commitment>>, ApiError> {
    let correlation_id = new_correlation_id();
    let employee_code = non_blank(params.employee_code.as_deref());
    let period = non_blank(params.period.as_deref());

    let commitments = SqlCommitmentRepository::new(state.db_pool.clone())
        .list(employee_code.as_deref(), period.as_deref())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(commitments))
}

pub async fn create_commitment(
    State(state): State<ApiState>,
    Json(body): Json<CommitmentRequest>,
) -> Result<(StatusCode, Json<Commitment>), ApiError> {
    let correlation_id = new_correlation_id();
    let validated = validate(&body).map_err(|message| bad_request(message, &correlation_id))?;
    let (employee_code, product, quantity, amount) = validated;
    let period = body.period.trim();

    let commitment = SqlCommitmentRepository::new(state.db_pool.clone())
        .create(&employee_code, &product, quantity, amount, period)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.commitment.created",
        correlation_id = %correlation_id,
        commitment_id = %commitment.id.0,
        employee_code = %employee_code,
        period = %period,
        "commitment created"
    );
    Ok((StatusCode::CREATED, Json(commitment)))
}

pub async fn update_commitment_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Commitment>, ApiError> {
    let correlation_id = new_correlation_id();
    let status = CommitmentStatus::parse(&body.status).ok_or_else(|| {
        bad_request(
            format!(
                "unknown commitment status `{}` (expected open|achieved|missed|withdrawn)",
                body.status.trim()
            ),
            &correlation_id,
        )
    })?;

    let commitment = SqlCommitmentRepository::new(state.db_pool.clone())
        .set_status(&CommitmentId(id.trim().to_string()), status)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.commitment.status_changed",
        correlation_id = %correlation_id,
        commitment_id = %commitment.id.0,
        status = status.as_str(),
        "commitment status changed"
    );
    Ok(Json(commitment))
}

fn validate(body: &CommitmentRequest) -> Result<(String, String, f64, f64), String> {
    let period = body.period.trim();
    if !is_valid_period(period) {
        return Err(format!("period must be YYYY-MM, got `{period}`"));
    }
    Ok((
        required("employee_code", &body.employee_code)?,
        required("product", &body.product)?,
        non_negative("quantity", body.quantity)?,
        non_negative("amount", body.amount)?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use fieldpulse_core::domain::commitment::CommitmentStatus;

    use super::{
        create_commitment, list_commitments, update_commitment_status, CommitmentParams,
        CommitmentRequest, StatusRequest,
    };
    use crate::api::test_support::seeded_state;

    #[tokio::test]
    async fn commitment_lifecycle_through_handlers() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (status, Json(created)) = create_commitment(
            State(state.clone()),
            Json(CommitmentRequest {
                employee_code: "E-112".to_string(),
                product: "Beta".to_string(),
                quantity: 12.0,
                amount: 2400.0,
                period: "2024-04".to_string(),
            }),
        )
        .await
        .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.status, CommitmentStatus::Open);

        let Json(updated) = update_commitment_status(
            State(state.clone()),
            Path(created.id.0.clone()),
            Json(StatusRequest { status: "Achieved".to_string() }),
        )
        .await
        .expect("status");
        assert_eq!(updated.status, CommitmentStatus::Achieved);

        let Json(april) = list_commitments(
            State(state),
            Query(CommitmentParams { employee_code: None, period: Some("2024-04".to_string()) }),
        )
        .await
        .expect("list");
        assert_eq!(april.len(), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_status_is_bad_request() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (status, _) = update_commitment_status(
            State(state),
            Path("CMT-SEED-001".to_string()),
            Json(StatusRequest { status: "paused".to_string() }),
        )
        .await
        .expect_err("unknown status");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        pool.close().await;
    }
}
