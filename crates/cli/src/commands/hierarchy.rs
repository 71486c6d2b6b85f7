use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fieldpulse_core::config::AppConfig;
use fieldpulse_core::domain::org_unit::OrgUnit;
use fieldpulse_core::domain::sales::{is_valid_period, SalesMeasure};
use fieldpulse_core::hierarchy::{compute, Hierarchy, HierarchyOptions, RootSelector};
use fieldpulse_db::{
    HierarchyKeying, HierarchyQuery, HierarchyScope, InMemoryOrgUnitSource, OrgUnitSource,
    SqlOrgUnitSource,
};
use serde_json::json;

use crate::commands::{connect, exit, load_config, runtime, CommandResult, StepError};

#[derive(Debug, Clone, Default)]
pub struct HierarchyArgs {
    pub root: Option<String>,
    pub keying: String,
    pub period: Option<String>,
    /// Inclusive sale-date bounds (`YYYY-MM-DD`).
    pub from: Option<String>,
    pub to: Option<String>,
    pub measure: String,
    pub gate_by_role: bool,
    /// JSON array of flat org units; bypasses the database.
    pub fixture: Option<PathBuf>,
}

pub fn run(args: &HierarchyArgs) -> CommandResult {
    match build(args) {
        Ok(hierarchy) => {
            let node_count = hierarchy.node_count();
            let message = if hierarchy.is_empty() {
                "no organisation units matched the requested scope".to_string()
            } else {
                format!("computed {node_count} nodes under {} root(s)", hierarchy.roots.len())
            };
            let data = json!({ "roots": hierarchy, "nodeCount": node_count });
            CommandResult::success_with_data("hierarchy", message, data)
        }
        Err(step) => CommandResult::from_step("hierarchy", step),
    }
}

fn build(args: &HierarchyArgs) -> Result<Hierarchy, StepError> {
    let query = parse_query(args)?;
    let config = load_config()?;
    let options = options_for(args, &config);

    let units = match &args.fixture {
        Some(path) => {
            let source = InMemoryOrgUnitSource::new(read_fixture(path)?);
            runtime()?
                .block_on(source.fetch_units(&query))
                .map_err(|error| ("fixture", error.to_string(), exit::INPUT))?
        }
        None => runtime()?.block_on(fetch_from_database(&config, &query))?,
    };

    let selector = RootSelector::from_optional_key(args.root.as_deref());
    compute(&units, &selector, &options)
        .map_err(|error| ("malformed_hierarchy", error.to_string(), exit::VERIFICATION))
}

/// The `--gate-by-role` flag can switch gating on; it never switches off a configured default.
fn options_for(args: &HierarchyArgs, config: &AppConfig) -> HierarchyOptions {
    let defaults = config.hierarchy.to_options();
    HierarchyOptions { gate_by_role: args.gate_by_role || defaults.gate_by_role, ..defaults }
}

fn parse_query(args: &HierarchyArgs) -> Result<HierarchyQuery, StepError> {
    let invalid = |message: String| ("invalid_input", message, exit::INPUT);

    let keying = HierarchyKeying::parse(&args.keying).ok_or_else(|| {
        invalid(format!("unknown keying `{}` (expected territory|manager)", args.keying))
    })?;
    let measure = SalesMeasure::parse(&args.measure).ok_or_else(|| {
        invalid(format!("unknown measure `{}` (expected amount|quantity)", args.measure))
    })?;
    let period = args.period.as_deref().map(str::trim).filter(|period| !period.is_empty());
    if let Some(period) = period {
        if !is_valid_period(period) {
            return Err(invalid(format!("period must be YYYY-MM, got `{period}`")));
        }
    }
    let from = parse_date("from", args.from.as_deref()).map_err(invalid)?;
    let to = parse_date("to", args.to.as_deref()).map_err(invalid)?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(invalid(format!("from ({from}) must not be after to ({to})")));
        }
    }
    let root = args.root.as_deref().map(str::trim).filter(|root| !root.is_empty());

    Ok(HierarchyQuery {
        scope: root.map(|root| HierarchyScope::Root(root.to_string())).unwrap_or_default(),
        keying,
        period: period.map(str::to_string),
        from,
        to,
        measure,
    })
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("{field} must be YYYY-MM-DD, got `{raw}`")),
    }
}

fn read_fixture(path: &Path) -> Result<Vec<OrgUnit>, StepError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ("fixture", format!("could not read `{}`: {error}", path.display()), exit::INPUT)
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        ("fixture", format!("could not parse `{}`: {error}", path.display()), exit::INPUT)
    })
}

async fn fetch_from_database(
    config: &AppConfig,
    query: &HierarchyQuery,
) -> Result<Vec<OrgUnit>, StepError> {
    let pool = connect(config).await?;
    let units = SqlOrgUnitSource::new(pool.clone())
        .fetch_units(query)
        .await
        .map_err(|error| ("db_query", error.to_string(), exit::DATABASE));
    pool.close().await;
    units
}
