//! Org hierarchy assembly and metric roll-up.
//!
//! Flat [`OrgUnit`] rows are indexed once by key and by parent key, then each
//! requested root is built post-order: children first, then the parent's
//! aggregates from the children's already-aggregated values.
//!
//! - KPI metrics roll up as `round(mean(children))` over direct children, so every
//!   sub-branch weighs the same regardless of how many leaves it holds
//!   ([`AveragingMode::LeafWeighted`] switches to leaf-count weighting).
//! - Per-category quantities are summed across children.
//! - A node is a leaf iff it has no children in the row set; its role only decides
//!   whether it carries raw values when `gate_by_role` is on.

mod aggregate;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::org_unit::{OrgUnit, DEFAULT_LEAF_ROLES};

pub const DEFAULT_KPI_METRICS: &[&str] = &["coverage", "calls", "compliance"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootSelector {
    /// Build only the subtree under this key.
    Key(String),
    /// Every row whose parent is null or missing from the row set becomes a root.
    Detached,
}

impl RootSelector {
    pub fn from_optional_key(key: Option<&str>) -> Self {
        match key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => Self::Key(key.to_string()),
            None => Self::Detached,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragingMode {
    #[default]
    MeanOfChildren,
    LeafWeighted,
}

impl AveragingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeanOfChildren => "mean_of_children",
            Self::LeafWeighted => "leaf_weighted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean_of_children" | "mean" => Some(Self::MeanOfChildren),
            "leaf_weighted" | "weighted" => Some(Self::LeafWeighted),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyOptions {
    /// When set, only rows whose role is in `leaf_roles` contribute raw values.
    pub gate_by_role: bool,
    pub leaf_roles: Vec<String>,
    /// Metrics every node carries even when no row reports them.
    pub kpi_metrics: Vec<String>,
    pub averaging: AveragingMode,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            gate_by_role: false,
            leaf_roles: DEFAULT_LEAF_ROLES.iter().map(ToString::to_string).collect(),
            kpi_metrics: DEFAULT_KPI_METRICS.iter().map(ToString::to_string).collect(),
            averaging: AveragingMode::MeanOfChildren,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub key: String,
    pub name: String,
    pub role: String,
    pub metrics: BTreeMap<String, f64>,
    pub quantities: BTreeMap<String, f64>,
    pub total_sales: f64,
    pub leaf_count: u32,
    pub children: BTreeMap<String, HierarchyNode>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    pub fn quantity(&self, category: &str) -> f64 {
        self.quantities.get(category).copied().unwrap_or(0.0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(HierarchyNode::node_count).sum::<usize>()
    }

    pub fn find(&self, key: &str) -> Option<&HierarchyNode> {
        if self.key == key {
            return Some(self);
        }
        self.children.values().find_map(|child| child.find(key))
    }
}

/// Roots of a computed hierarchy, keyed by their own key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Hierarchy {
    pub roots: BTreeMap<String, HierarchyNode>,
}

impl Hierarchy {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.roots.values().map(HierarchyNode::node_count).sum()
    }

    pub fn find(&self, key: &str) -> Option<&HierarchyNode> {
        self.roots.values().find_map(|root| root.find(key))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("malformed hierarchy: parent references form a cycle through `{key}`")]
    Cycle { key: String },
    #[error("malformed hierarchy: key `{key}` appears on more than one row")]
    DuplicateKey { key: String },
}

impl HierarchyError {
    pub fn key(&self) -> &str {
        match self {
            Self::Cycle { key } | Self::DuplicateKey { key } => key,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HierarchyBuilder {
    options: HierarchyOptions,
}

impl HierarchyBuilder {
    pub fn new(options: HierarchyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HierarchyOptions {
        &self.options
    }

    pub fn build(
        &self,
        rows: &[OrgUnit],
        selector: &RootSelector,
    ) -> Result<Hierarchy, HierarchyError> {
        let index = RowIndex::new(rows)?;
        let schema = metric_schema(&self.options, rows);

        let roots: Vec<&OrgUnit> = match selector {
            RootSelector::Key(key) => index.by_key.get(key.trim()).copied().into_iter().collect(),
            RootSelector::Detached => rows
                .iter()
                .filter(|row| row.parent().map(|parent| !index.contains(parent)).unwrap_or(true))
                .collect(),
        };

        let mut pass = BuildPass {
            options: &self.options,
            index: &index,
            schema: &schema,
            visited: HashSet::new(),
        };
        let mut hierarchy = Hierarchy::default();
        for root in roots {
            let node = pass.build_node(root)?;
            hierarchy.roots.insert(node.key.clone(), node);
        }

        // Every acyclic chain ends at a detached root, so rows left over sit on a cycle.
        if *selector == RootSelector::Detached && pass.visited.len() < rows.len() {
            if let Some(stranded) = rows.iter().find(|row| !pass.visited.contains(row.key())) {
                return Err(HierarchyError::Cycle { key: stranded.key().to_string() });
            }
        }

        Ok(hierarchy)
    }
}

/// Builds the hierarchy for `rows` in one call.
pub fn compute(
    rows: &[OrgUnit],
    selector: &RootSelector,
    options: &HierarchyOptions,
) -> Result<Hierarchy, HierarchyError> {
    HierarchyBuilder::new(options.clone()).build(rows, selector)
}

struct RowIndex<'a> {
    by_key: HashMap<&'a str, &'a OrgUnit>,
    children: HashMap<&'a str, Vec<&'a OrgUnit>>,
}

impl<'a> RowIndex<'a> {
    fn new(rows: &'a [OrgUnit]) -> Result<Self, HierarchyError> {
        let mut by_key = HashMap::with_capacity(rows.len());
        for row in rows {
            if by_key.insert(row.key(), row).is_some() {
                return Err(HierarchyError::DuplicateKey { key: row.key().to_string() });
            }
        }

        let mut children: HashMap<&str, Vec<&OrgUnit>> = HashMap::new();
        for row in rows {
            if let Some(parent) = row.parent() {
                if let Some(&parent_row) = by_key.get(parent) {
                    children.entry(parent_row.key()).or_default().push(row);
                }
            }
        }

        Ok(Self { by_key, children })
    }

    fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }
}

fn metric_schema(options: &HierarchyOptions, rows: &[OrgUnit]) -> BTreeSet<String> {
    options
        .kpi_metrics
        .iter()
        .cloned()
        .chain(rows.iter().flat_map(|row| row.raw_metrics.keys().cloned()))
        .collect()
}

struct BuildPass<'a> {
    options: &'a HierarchyOptions,
    index: &'a RowIndex<'a>,
    schema: &'a BTreeSet<String>,
    visited: HashSet<&'a str>,
}

impl<'a> BuildPass<'a> {
    fn build_node(&mut self, unit: &'a OrgUnit) -> Result<HierarchyNode, HierarchyError> {
        // Each row sits in at most one child list, so a second visit means a cycle.
        if !self.visited.insert(unit.key()) {
            return Err(HierarchyError::Cycle { key: unit.key().to_string() });
        }

        let index = self.index;
        let child_rows = index.children.get(unit.key());
        let Some(child_rows) = child_rows.filter(|rows| !rows.is_empty()) else {
            return Ok(aggregate::leaf(unit, self.schema, self.options));
        };

        let mut children = BTreeMap::new();
        for &child in child_rows {
            let node = self.build_node(child)?;
            children.insert(node.key.clone(), node);
        }

        Ok(aggregate::manager(unit, children, self.schema, self.options.averaging))
    }
}
