use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fieldpulse_core::domain::employee::Employee;
use fieldpulse_core::domain::org_unit::RoleClass;
use fieldpulse_core::errors::ApplicationError;
use fieldpulse_db::repositories::{EmployeeDraft, SqlEmployeeRepository};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{bad_request, new_correlation_id, non_blank, reject, required, storage_error};
use super::{ApiError, ApiState};

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeListParams {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeRequest {
    /// Required on create; ignored on update, where the path names the employee.
    #[serde(default)]
    pub employee_code: Option<String>,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub territory_code: Option<String>,
    pub parent_territory_code: Option<String>,
    pub manager_code: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub employee_code: String,
    pub role: String,
    pub leaf_eligible: bool,
}

pub async fn list_employees(
    State(state): State<ApiState>,
    Query(params): Query<EmployeeListParams>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    let correlation_id = new_correlation_id();
    let role = non_blank(params.role.as_deref());
    let employees = SqlEmployeeRepository::new(state.db_pool.clone())
        .list(role.as_deref())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(employees))
}

pub async fn get_employee(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<Employee>, ApiError> {
    let correlation_id = new_correlation_id();
    let employee = SqlEmployeeRepository::new(state.db_pool.clone())
        .find(code.trim())
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    match employee {
        Some(employee) => Ok(Json(employee)),
        None => Err(reject(
            ApplicationError::NotFound(format!("employee `{}` not found", code.trim())),
            &correlation_id,
        )),
    }
}

pub async fn create_employee(
    State(state): State<ApiState>,
    Json(body): Json<EmployeeRequest>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let correlation_id = new_correlation_id();
    let code = required("employee_code", body.employee_code.as_deref().unwrap_or_default())
        .map_err(|message| bad_request(message, &correlation_id))?;
    let draft = to_draft(&code, &body).map_err(|message| bad_request(message, &correlation_id))?;

    let employee = SqlEmployeeRepository::new(state.db_pool.clone())
        .create(&code, &draft)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.employee.created",
        correlation_id = %correlation_id,
        employee_code = %code,
        role = %employee.role,
        "employee created"
    );
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(state): State<ApiState>,
    Path(code): Path<String>,
    Json(body): Json<EmployeeRequest>,
) -> Result<Json<Employee>, ApiError> {
    let correlation_id = new_correlation_id();
    let code = required("employee_code", &code).map_err(|message| bad_request(message, &correlation_id))?;
    let draft = to_draft(&code, &body).map_err(|message| bad_request(message, &correlation_id))?;

    let employee = SqlEmployeeRepository::new(state.db_pool.clone())
        .update(&code, &draft)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    info!(
        event_name = "api.employee.updated",
        correlation_id = %correlation_id,
        employee_code = %code,
        "employee updated"
    );
    Ok(Json(employee))
}

pub async fn employee_role(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let code = code.trim().to_string();
    let role = SqlEmployeeRepository::new(state.db_pool.clone())
        .role_of(&code)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?
        .ok_or_else(|| {
            reject(
                ApplicationError::NotFound(format!("employee `{code}` not found")),
                &correlation_id,
            )
        })?;

    let leaf_eligible = RoleClass::new(role.as_str()).is_one_of(&state.hierarchy.leaf_roles);
    Ok(Json(RoleResponse { employee_code: code, role, leaf_eligible }))
}

fn to_draft(code: &str, body: &EmployeeRequest) -> Result<EmployeeDraft, String> {
    let territory_code = non_blank(body.territory_code.as_deref());
    let parent_territory_code = non_blank(body.parent_territory_code.as_deref());
    let manager_code = non_blank(body.manager_code.as_deref());

    if territory_code.is_some() && territory_code == parent_territory_code {
        return Err("territory cannot be its own parent territory".to_string());
    }
    if manager_code.as_deref() == Some(code) {
        return Err("employee cannot be their own manager".to_string());
    }

    Ok(EmployeeDraft {
        name: required("name", &body.name)?,
        role: required("role", &body.role)?.to_ascii_uppercase(),
        email: non_blank(body.email.as_deref()),
        territory_code,
        parent_territory_code,
        manager_code,
        active: body.active.unwrap_or(true),
    })
}
