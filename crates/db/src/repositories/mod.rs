use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use fieldpulse_core::domain::org_unit::OrgUnit;
use fieldpulse_core::domain::sales::SalesMeasure;

pub mod commitment;
pub mod employee;
pub mod escalation;
pub mod memory;
pub mod message;
pub mod org_units;
pub mod sales;

pub use commitment::SqlCommitmentRepository;
pub use employee::{EmployeeDraft, SqlEmployeeRepository};
pub use escalation::SqlEscalationRepository;
pub use memory::InMemoryOrgUnitSource;
pub use message::SqlMessageRepository;
pub use org_units::SqlOrgUnitSource;
pub use sales::{SalesFilter, SqlKpiRepository, SqlSalesRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Maps constraint violations onto the caller-facing variants; everything else stays a
    /// database error.
    pub(crate) fn from_write(error: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return Self::Conflict(format!("{context} conflicts with an existing record"));
            }
            if db_error.is_foreign_key_violation() {
                return Self::NotFound(format!("{context} references an unknown employee"));
            }
        }
        Self::Database(error)
    }
}

/// Which parent relation links rows into a tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HierarchyKeying {
    /// Key = territory code, parent = parent territory code.
    #[default]
    Territory,
    /// Key = employee code, parent = manager code.
    Manager,
}

impl HierarchyKeying {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Territory => "territory",
            Self::Manager => "manager",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "territory" => Some(Self::Territory),
            "manager" | "reporting" => Some(Self::Manager),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HierarchyScope {
    #[default]
    All,
    /// The unit with this key and everything beneath it.
    Root(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HierarchyQuery {
    pub scope: HierarchyScope,
    pub keying: HierarchyKeying,
    /// KPI period (`YYYY-MM`); all periods are averaged when absent.
    pub period: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub measure: SalesMeasure,
}

/// Read side of the organisation store used to feed the hierarchy builder.
#[async_trait]
pub trait OrgUnitSource: Send + Sync {
    async fn fetch_units(&self, query: &HierarchyQuery) -> Result<Vec<OrgUnit>, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: `{raw}` ({error})")))
}

pub(crate) fn parse_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column}: `{raw}` ({error})")))
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}
