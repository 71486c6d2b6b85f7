use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role codes that identify individual contributors in the field force.
pub const DEFAULT_LEAF_ROLES: &[&str] = &["BE", "TE", "KAE", "NE"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleClass(pub String);

impl RoleClass {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_one_of<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        let own = self.0.trim();
        roles.iter().any(|role| role.as_ref().trim().eq_ignore_ascii_case(own))
    }
}

/// A (category, value) pair attached to a leaf unit, e.g. sales of one product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub category: String,
    pub value: Option<f64>,
}

impl DetailRow {
    pub fn new(category: impl Into<String>, value: f64) -> Self {
        Self { category: category.into(), value: Some(value) }
    }
}

/// One flat row of an organisation query, before it is linked into a tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub key: String,
    pub parent_key: Option<String>,
    pub display_name: String,
    pub role_class: RoleClass,
    #[serde(default)]
    pub raw_metrics: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub leaf_detail_rows: Vec<DetailRow>,
}

impl OrgUnit {
    pub fn new(
        key: impl Into<String>,
        parent_key: Option<&str>,
        display_name: impl Into<String>,
        role_class: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            parent_key: parent_key.map(str::to_string),
            display_name: display_name.into(),
            role_class: RoleClass::new(role_class),
            raw_metrics: BTreeMap::new(),
            leaf_detail_rows: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.raw_metrics.insert(metric.into(), Some(value));
        self
    }

    pub fn with_detail(mut self, category: impl Into<String>, value: f64) -> Self {
        self.leaf_detail_rows.push(DetailRow::new(category, value));
        self
    }

    /// Own key without surrounding padding, matching how `parent` reads references.
    pub fn key(&self) -> &str {
        self.key.trim()
    }

    /// Parent key with blank strings folded to `None`; stores are inconsistent about this.
    pub fn parent(&self) -> Option<&str> {
        self.parent_key.as_deref().map(str::trim).filter(|parent| !parent.is_empty())
    }
}
