use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use fieldpulse_core::domain::sales::{is_valid_period, SalesMeasure};
use fieldpulse_core::errors::{ApplicationError, DomainError};
use fieldpulse_core::hierarchy::{
    AveragingMode, Hierarchy, HierarchyBuilder, HierarchyNode, HierarchyOptions, RootSelector,
};
use fieldpulse_db::{HierarchyKeying, HierarchyQuery, HierarchyScope};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{bad_request, new_correlation_id, non_blank, parse_date_range, reject, storage_error};
use super::{ApiError, ApiState};

const EMPTY_SCOPE_MESSAGE: &str = "no organisational units found for scope";

#[derive(Debug, Default, Deserialize)]
pub struct HierarchyParams {
    pub root: Option<String>,
    pub keying: Option<String>,
    pub gate_by_role: Option<bool>,
    pub averaging: Option<String>,
    pub measure: Option<String>,
    pub period: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyResponse {
    pub roots: BTreeMap<String, HierarchyNode>,
    pub node_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Hierarchy> for HierarchyResponse {
    fn from(hierarchy: Hierarchy) -> Self {
        let node_count = hierarchy.node_count();
        let message = hierarchy.is_empty().then(|| EMPTY_SCOPE_MESSAGE.to_string());
        Self { roots: hierarchy.roots, node_count, message }
    }
}

pub async fn hierarchy(
    State(state): State<ApiState>,
    Query(params): Query<HierarchyParams>,
) -> Result<Json<HierarchyResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let root = non_blank(params.root.as_deref());
    build_hierarchy(&state, &params, root, &correlation_id).await
}

pub async fn hierarchy_for_root(
    State(state): State<ApiState>,
    Path(root): Path<String>,
    Query(params): Query<HierarchyParams>,
) -> Result<Json<HierarchyResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let Some(root) = non_blank(Some(&root)) else {
        return Err(bad_request("root key must not be blank", &correlation_id));
    };
    build_hierarchy(&state, &params, Some(root), &correlation_id).await
}

async fn build_hierarchy(
    state: &ApiState,
    params: &HierarchyParams,
    root: Option<String>,
    correlation_id: &str,
) -> Result<Json<HierarchyResponse>, ApiError> {
    let (query, options) = parse_request(&state.hierarchy, params, root.clone())
        .map_err(|message| bad_request(message, correlation_id))?;

    let rows =
        state.source.fetch_units(&query).await.map_err(|error| storage_error(error, correlation_id))?;

    let selector = RootSelector::from_optional_key(root.as_deref());
    let hierarchy = match HierarchyBuilder::new(options).build(&rows, &selector) {
        Ok(hierarchy) => hierarchy,
        Err(build_error) => {
            error!(
                event_name = "api.hierarchy.malformed",
                correlation_id = %correlation_id,
                offending_key = %build_error.key(),
                row_count = rows.len(),
                "stored organisation topology is malformed"
            );
            return Err(reject(
                ApplicationError::Domain(DomainError::from(build_error)),
                correlation_id,
            ));
        }
    };

    info!(
        event_name = "api.hierarchy.built",
        correlation_id = %correlation_id,
        root_key = root.as_deref().unwrap_or("*"),
        keying = query.keying.as_str(),
        row_count = rows.len(),
        node_count = hierarchy.node_count(),
        "hierarchy computed"
    );

    Ok(Json(HierarchyResponse::from(hierarchy)))
}

fn parse_request(
    defaults: &HierarchyOptions,
    params: &HierarchyParams,
    root: Option<String>,
) -> Result<(HierarchyQuery, HierarchyOptions), String> {
    let keying = match non_blank(params.keying.as_deref()) {
        None => HierarchyKeying::default(),
        Some(raw) => HierarchyKeying::parse(&raw)
            .ok_or_else(|| format!("unknown keying `{raw}` (expected territory|manager)"))?,
    };
    let measure = match non_blank(params.measure.as_deref()) {
        None => SalesMeasure::default(),
        Some(raw) => SalesMeasure::parse(&raw)
            .ok_or_else(|| format!("unknown measure `{raw}` (expected amount|quantity)"))?,
    };
    let averaging = match non_blank(params.averaging.as_deref()) {
        None => defaults.averaging,
        Some(raw) => AveragingMode::parse(&raw).ok_or_else(|| {
            format!("unknown averaging `{raw}` (expected mean_of_children|leaf_weighted)")
        })?,
    };
    let period = non_blank(params.period.as_deref());
    if let Some(period) = &period {
        if !is_valid_period(period) {
            return Err(format!("period must be YYYY-MM, got `{period}`"));
        }
    }
    let (from, to) = parse_date_range(params.from.as_deref(), params.to.as_deref())?;

    let query = HierarchyQuery {
        scope: root.map(HierarchyScope::Root).unwrap_or_default(),
        keying,
        period,
        from,
        to,
        measure,
    };
    let options = HierarchyOptions {
        gate_by_role: params.gate_by_role.unwrap_or(defaults.gate_by_role),
        averaging,
        ..defaults.clone()
    };
    Ok((query, options))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use fieldpulse_core::domain::org_unit::OrgUnit;
    use fieldpulse_db::InMemoryOrgUnitSource;

    use super::{hierarchy, hierarchy_for_root, HierarchyParams};
    use crate::api::test_support::seeded_state;

    fn march() -> HierarchyParams {
        HierarchyParams {
            period: Some("2024-03".to_string()),
            from: Some("2024-03-01".to_string()),
            to: Some("2024-03-31".to_string()),
            measure: Some("quantity".to_string()),
            ..HierarchyParams::default()
        }
    }

    #[tokio::test]
    async fn root_path_returns_aggregated_subtree() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let Json(response) =
            hierarchy_for_root(State(state), Path("T-ASM-N1".to_string()), Query(march()))
                .await
                .expect("hierarchy");

        assert_eq!(response.node_count, 3);
        let area = &response.roots["T-ASM-N1"];
        assert_eq!(area.metric("coverage"), 70.0);
        assert_eq!(area.quantity("Alpha"), 15.0);
        assert_eq!(area.total_sales, 23.0);
        assert!(response.message.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_root_is_empty_with_message() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let Json(response) =
            hierarchy_for_root(State(state), Path("T-NOWHERE".to_string()), Query(march()))
                .await
                .expect("hierarchy");

        assert!(response.roots.is_empty());
        assert_eq!(response.node_count, 0);
        assert!(response.message.is_some());

        pool.close().await;
    }

    #[tokio::test]
    async fn blank_root_path_is_bad_request() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let (status, Json(body)) =
            hierarchy_for_root(State(state), Path("  ".to_string()), Query(march()))
                .await
                .expect_err("blank root");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("root"));
        pool.close().await;
    }

    #[tokio::test]
    async fn invalid_filters_are_rejected_before_querying() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        for params in [
            HierarchyParams { keying: Some("matrix".to_string()), ..march() },
            HierarchyParams { period: Some("2024-3".to_string()), ..march() },
            HierarchyParams { from: Some("2024-04-01".to_string()), ..march() },
            HierarchyParams { averaging: Some("median".to_string()), ..march() },
        ] {
            let (status, _) =
                hierarchy(State(state.clone()), Query(params)).await.expect_err("invalid");
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn role_gating_can_be_enabled_per_request() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();

        let Json(ungated) = hierarchy(State(state.clone()), Query(march())).await.expect("ungated");
        let Json(gated) = hierarchy(
            State(state),
            Query(HierarchyParams { gate_by_role: Some(true), ..march() }),
        )
        .await
        .expect("gated");

        // Every seeded leaf holds a leaf role, so gating changes nothing here.
        assert_eq!(ungated.roots["T-RSM-N"].metrics, gated.roots["T-RSM-N"].metrics);
        assert_eq!(gated.roots["T-RSM-N"].metric("calls"), 72.0);

        pool.close().await;
    }

    #[tokio::test]
    async fn cyclic_topology_is_an_internal_error() {
        let state = seeded_state().await;
        let pool = state.db_pool.clone();
        let source = InMemoryOrgUnitSource::new(vec![
            OrgUnit::new("P", Some("Q"), "P", "ASM"),
            OrgUnit::new("Q", Some("P"), "Q", "ASM"),
        ]);
        let state = state.with_source(Arc::new(source));

        let (status, Json(body)) = hierarchy(
            State(state),
            Query(HierarchyParams { root: Some("P".to_string()), ..HierarchyParams::default() }),
        )
        .await
        .expect_err("cycle");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("cycle"));
        pool.close().await;
    }
}
