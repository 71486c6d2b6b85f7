use std::collections::{BTreeMap, BTreeSet};

use super::{AveragingMode, HierarchyNode, HierarchyOptions};
use crate::domain::org_unit::OrgUnit;

pub(super) fn leaf(
    unit: &OrgUnit,
    schema: &BTreeSet<String>,
    options: &HierarchyOptions,
) -> HierarchyNode {
    let gated_out = options.gate_by_role && !unit.role_class.is_one_of(&options.leaf_roles);

    let metrics = schema
        .iter()
        .map(|metric| {
            let value = if gated_out {
                0.0
            } else {
                unit.raw_metrics.get(metric).copied().map(numeric_or_zero).unwrap_or(0.0)
            };
            (metric.clone(), value)
        })
        .collect();

    let mut quantities = BTreeMap::new();
    if !gated_out {
        for row in &unit.leaf_detail_rows {
            *quantities.entry(row.category.clone()).or_insert(0.0) += numeric_or_zero(row.value);
        }
    }

    node(unit, metrics, quantities, 1, BTreeMap::new())
}

pub(super) fn manager(
    unit: &OrgUnit,
    children: BTreeMap<String, HierarchyNode>,
    schema: &BTreeSet<String>,
    averaging: AveragingMode,
) -> HierarchyNode {
    let leaf_count = children.values().map(|child| child.leaf_count).sum();

    let metrics = schema
        .iter()
        .map(|metric| (metric.clone(), rolled_up_metric(&children, metric, averaging)))
        .collect();

    let mut quantities = BTreeMap::new();
    for child in children.values() {
        for (category, value) in &child.quantities {
            *quantities.entry(category.clone()).or_insert(0.0) += value;
        }
    }

    node(unit, metrics, quantities, leaf_count, children)
}

fn rolled_up_metric(
    children: &BTreeMap<String, HierarchyNode>,
    metric: &str,
    averaging: AveragingMode,
) -> f64 {
    if children.is_empty() {
        return 0.0;
    }

    let mean = match averaging {
        AveragingMode::MeanOfChildren => {
            let sum: f64 = children.values().map(|child| child.metric(metric)).sum();
            sum / children.len() as f64
        }
        AveragingMode::LeafWeighted => {
            let weight: u32 = children.values().map(|child| child.leaf_count).sum();
            if weight == 0 {
                return 0.0;
            }
            let sum: f64 = children
                .values()
                .map(|child| child.metric(metric) * f64::from(child.leaf_count))
                .sum();
            sum / f64::from(weight)
        }
    };

    mean.round()
}

fn node(
    unit: &OrgUnit,
    metrics: BTreeMap<String, f64>,
    quantities: BTreeMap<String, f64>,
    leaf_count: u32,
    children: BTreeMap<String, HierarchyNode>,
) -> HierarchyNode {
    let total_sales = quantities.values().sum();
    HierarchyNode {
        key: unit.key().to_string(),
        name: unit.display_name.clone(),
        role: unit.role_class.as_str().to_string(),
        metrics,
        quantities,
        total_sales,
        leaf_count,
        children,
    }
}

fn numeric_or_zero(value: Option<f64>) -> f64 {
    value.filter(|value| value.is_finite()).unwrap_or(0.0)
}
