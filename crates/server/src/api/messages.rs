use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use fieldpulse_core::domain::message::InfoMessage;
use fieldpulse_db::repositories::SqlMessageRepository;
use serde::Deserialize;
use tracing::info;

use super::{bad_request, new_correlation_id, non_blank, required, storage_error};
use super::{ApiError, ApiState};

#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub title: String,
    pub body: String,
    pub audience_role: Option<String>,
    pub created_by: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Messages that have not expired, narrowed to `role` when one is given.
pub async fn list_messages(
    State(state): State<ApiState>,
    Query(params): Query<MessageParams>,
) -> Result<Json<Vec<InfoMessage>>, ApiError> {
    let correlation_id = new_correlation_id();
    let role = non_blank(params.role.as_deref());

    let messages = SqlMessageRepository::new(state.db_pool.clone())
        .list_active(Utc::now(), role.as_deref())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(messages))
}

pub async fn create_message(
    State(state): State<ApiState>,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<InfoMessage>), ApiError> {
    let correlation_id = new_correlation_id();
    let (title, body, created_by) =
        validate(&request, Utc::now()).map_err(|message| bad_request(message, &correlation_id))?;
    let audience_role =
        non_blank(request.audience_role.as_deref()).map(|role| role.to_ascii_uppercase());

    let message = SqlMessageRepository::new(state.db_pool.clone())
        .create(&title, &body, audience_role.as_deref(), &created_by, request.expires_at)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.message.created",
        correlation_id = %correlation_id,
        message_id = %message.id.0,
        audience_role = audience_role.as_deref().unwrap_or("all"),
        "info message published"
    );
    Ok((StatusCode::CREATED, Json(message)))
}

fn validate(
    request: &MessageRequest,
    now: DateTime<Utc>,
) -> Result<(String, String, String), String> {
    if request.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err("expires_at must be in the future".to_string());
    }
    Ok((
        required("title", &request.title)?,
        required("body", &request.body)?,
        required("created_by", &request.created_by)?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Query, State},
        http::StatusCode,
        Json,
    };
    use chrono::{Duration, Utc};

    use super::{create_message, list_messages, MessageParams, MessageRequest};
    use crate::api::test_support::seeded_state;

    fn request(audience_role: Option<&str>) -> MessageRequest {
        MessageRequest {
            title: "Ride-along week".to_string(),
            body: "Area managers join territory visits next week.".to_string(),
            audience_role: audience_role.map(str::to_string),
            created_by: "E-100".to_string(),
            expires_at: Some(Utc::now() + Duration::days(7)),
        }
    }

    #[tokio::test]
    async fn role_targeted_messages_are_hidden_from_other_roles() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (status, Json(created)) =
            create_message(State(state.clone()), Json(request(Some("asm"))))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.audience_role.as_deref(), Some("ASM"));

        let Json(for_asm) = list_messages(
            State(state.clone()),
            Query(MessageParams { role: Some("ASM".to_string()) }),
        )
        .await
        .expect("asm list");
        assert_eq!(for_asm.len(), 2);

        let Json(for_be) =
            list_messages(State(state), Query(MessageParams { role: Some("BE".to_string()) }))
                .await
                .expect("be list");
        assert_eq!(for_be.len(), 1);
        assert_eq!(for_be[0].id.0, "MSG-SEED-001");

        pool.close().await;
    }

    #[tokio::test]
    async fn past_expiry_is_bad_request() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();
        let mut stale = request(None);
        stale.expires_at = Some(Utc::now() - Duration::hours(1));

        let (status, Json(body)) =
            create_message(State(state), Json(stale)).await.expect_err("stale");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("expires_at"));
        pool.close().await;
    }
}
