use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fieldpulse_core::domain::escalation::{Escalation, EscalationId, EscalationStatus};
use fieldpulse_core::errors::{ApplicationError, DomainError};
use fieldpulse_db::repositories::SqlEscalationRepository;
use serde::Deserialize;
use tracing::info;

use super::{bad_request, new_correlation_id, non_blank, reject, required, storage_error};
use super::{ApiError, ApiState};

#[derive(Debug, Default, Deserialize)]
pub struct EscalationParams {
    pub status: Option<String>,
    pub employee_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalationRequest {
    pub employee_code: String,
    pub raised_by: String,
    pub subject: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct EscalationStatusRequest {
    pub status: String,
}

fn parse_status(raw: &str) -> Result<EscalationStatus, String> {
    EscalationStatus::parse(raw).ok_or_else(|| {
        format!("unknown escalation status `{}` (expected open|acknowledged|resolved)", raw.trim())
    })
}

fn validate(body: &EscalationRequest) -> Result<(String, String, String), String> {
    Ok((
        required("employee_code", &body.employee_code)?,
        required("raised_by", &body.raised_by)?,
        required("subject", &body.subject)?,
    ))
}

pub async fn list_escalations(
    State(state): State<ApiState>,
    Query(params): Query<EscalationParams>,
) -> Result<Json<Vec<Escalation>>, ApiError> {
    let correlation_id = new_correlation_id();
    let status = non_blank(params.status.as_deref())
        .map(|raw| parse_status(&raw))
        .transpose()
        .map_err(|message| bad_request(message, &correlation_id))?;
    let employee_code = non_blank(params.employee_code.as_deref());

    let escalations = SqlEscalationRepository::new(state.db_pool.clone())
        .list(status, employee_code.as_deref())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(escalations))
}

pub async fn create_escalation(
    State(state): State<ApiState>,
    Json(body): Json<EscalationRequest>,
) -> Result<(StatusCode, Json<Escalation>), ApiError> {
    let correlation_id = new_correlation_id();
    let (employee_code, raised_by, subject) =
        validate(&body).map_err(|message| bad_request(message, &correlation_id))?;

    let escalation = SqlEscalationRepository::new(state.db_pool.clone())
        .create(&employee_code, &raised_by, &subject, body.detail.trim())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.escalation.created",
        correlation_id = %correlation_id,
        escalation_id = %escalation.id.0,
        employee_code = %employee_code,
        raised_by = %raised_by,
        "escalation raised"
    );
    Ok((StatusCode::CREATED, Json(escalation)))
}

pub async fn update_escalation_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<EscalationStatusRequest>,
) -> Result<Json<Escalation>, ApiError> {
    let correlation_id = new_correlation_id();
    let next = parse_status(&body.status).map_err(|message| bad_request(message, &correlation_id))?;
    let id = EscalationId(id.trim().to_string());
    let repository = SqlEscalationRepository::new(state.db_pool.clone());

    let current = repository
        .find(&id)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?
        .ok_or_else(|| {
            reject(ApplicationError::NotFound(format!("escalation `{}` not found", id.0)), &correlation_id)
        })?;

    if !current.status.can_transition_to(next) {
        return Err(reject(
            ApplicationError::Domain(DomainError::InvalidEscalationTransition {
                from: current.status,
                to: next,
            }),
            &correlation_id,
        ));
    }

    let escalation = repository
        .transition(&id, current.status, next)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.escalation.status_changed",
        correlation_id = %correlation_id,
        escalation_id = %id.0,
        from = current.status.as_str(),
        to = next.as_str(),
        "escalation status changed"
    );
    Ok(Json(escalation))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use fieldpulse_core::domain::escalation::EscalationStatus;

    use super::{
        create_escalation, list_escalations, update_escalation_status, EscalationParams,
        EscalationRequest, EscalationStatusRequest,
    };
    use crate::api::test_support::seeded_state;

    fn status(value: &str) -> Json<EscalationStatusRequest> {
        Json(EscalationStatusRequest { status: value.to_string() })
    }

    #[tokio::test]
    async fn seeded_escalation_moves_forward_then_rejects_reopen() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let Json(acked) = update_escalation_status(
            State(state.clone()),
            Path("ESC-SEED-001".to_string()),
            status("ack"),
        )
        .await
        .expect("acknowledge");
        assert_eq!(acked.status, EscalationStatus::Acknowledged);

        let Json(resolved) = update_escalation_status(
            State(state.clone()),
            Path("ESC-SEED-001".to_string()),
            status("resolved"),
        )
        .await
        .expect("resolve");
        assert_eq!(resolved.status, EscalationStatus::Resolved);

        let (code, _) = update_escalation_status(
            State(state),
            Path("ESC-SEED-001".to_string()),
            status("open"),
        )
        .await
        .expect_err("reopen");
        assert_eq!(code, StatusCode::CONFLICT);

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_escalation_is_not_found() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (code, _) = update_escalation_status(
            State(state),
            Path("ESC-missing".to_string()),
            status("resolved"),
        )
        .await
        .expect_err("missing");

        assert_eq!(code, StatusCode::NOT_FOUND);
        pool.close().await;
    }

    #[tokio::test]
    async fn created_escalations_are_listed_as_open() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (code, _) = create_escalation(
            State(state.clone()),
            Json(EscalationRequest {
                employee_code: "E-122".to_string(),
                raised_by: "E-120".to_string(),
                subject: "Pricing dispute".to_string(),
                detail: String::new(),
            }),
        )
        .await
        .expect("create");
        assert_eq!(code, StatusCode::CREATED);

        let Json(open) = list_escalations(
            State(state.clone()),
            Query(EscalationParams { status: Some("open".to_string()), employee_code: None }),
        )
        .await
        .expect("list");
        assert_eq!(open.len(), 2);

        let (code, _) = list_escalations(
            State(state),
            Query(EscalationParams { status: Some("closed".to_string()), employee_code: None }),
        )
        .await
        .expect_err("bad status");
        assert_eq!(code, StatusCode::BAD_REQUEST);

        pool.close().await;
    }

    #[tokio::test]
    async fn blank_subject_is_bad_request() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (code, Json(body)) = create_escalation(
            State(state),
            Json(EscalationRequest {
                employee_code: "E-122".to_string(),
                raised_by: "E-120".to_string(),
                subject: "  ".to_string(),
                detail: String::new(),
            }),
        )
        .await
        .expect_err("blank subject");

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("subject"));
        pool.close().await;
    }
}
