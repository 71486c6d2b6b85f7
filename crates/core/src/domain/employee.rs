use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeCode(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryCode(pub String);

/// A member of the field organisation.
///
/// An employee is placed in the org tree twice over: once through the
/// territory it covers (`territory_code` → `parent_territory_code`) and once
/// through its reporting line (`manager_code`). Which of the two shapes a
/// hierarchy report follows is chosen per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub code: EmployeeCode,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub territory_code: Option<TerritoryCode>,
    pub parent_territory_code: Option<TerritoryCode>,
    pub manager_code: Option<EmployeeCode>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
