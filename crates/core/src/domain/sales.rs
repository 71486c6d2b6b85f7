use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeCode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleEntry {
    pub id: SaleId,
    pub employee_code: EmployeeCode,
    pub product: String,
    pub quantity: f64,
    pub amount: f64,
    pub sale_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Which column of a sale feeds the per-product detail rows of a hierarchy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesMeasure {
    #[default]
    Amount,
    Quantity,
}

impl SalesMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Quantity => "quantity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amount" => Some(Self::Amount),
            "quantity" | "qty" => Some(Self::Quantity),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KpiScoreId(pub String);

/// One KPI observation (coverage, calls, compliance, ...) for an employee in a period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KpiScore {
    pub id: KpiScoreId,
    pub employee_code: EmployeeCode,
    pub metric: String,
    /// Absent when the score was not captured; aggregation treats it as 0.
    pub value: Option<f64>,
    /// Reporting period in `YYYY-MM` form.
    pub period: String,
    pub created_at: DateTime<Utc>,
}

pub fn is_valid_period(period: &str) -> bool {
    let Some((year, month)) = period.split_once('-') else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|ch| ch.is_ascii_digit())
        && month.len() == 2
        && matches!(month.parse::<u8>(), Ok(1..=12))
}
