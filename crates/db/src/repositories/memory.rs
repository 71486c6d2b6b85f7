use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::RwLock;

use fieldpulse_core::domain::org_unit::OrgUnit;

use super::{HierarchyQuery, HierarchyScope, OrgUnitSource, RepositoryError};

/// Org rows held in memory; used by tests and by the CLI when reading an exported file.
///
/// Rows are stored already keyed, so `HierarchyQuery::keying` and the period/date filters do
/// not apply here.
#[derive(Default)]
pub struct InMemoryOrgUnitSource {
    units: RwLock<Vec<OrgUnit>>,
}

impl InMemoryOrgUnitSource {
    pub fn new(units: Vec<OrgUnit>) -> Self {
        Self { units: RwLock::new(units) }
    }

    pub async fn replace(&self, units: Vec<OrgUnit>) {
        *self.units.write().await = units;
    }

    pub async fn len(&self) -> usize {
        self.units.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl OrgUnitSource for InMemoryOrgUnitSource {
    async fn fetch_units(&self, query: &HierarchyQuery) -> Result<Vec<OrgUnit>, RepositoryError> {
        let units = self.units.read().await;
        let root = match &query.scope {
            HierarchyScope::All => return Ok(units.to_vec()),
            HierarchyScope::Root(root) => root.as_str(),
        };

        let mut children: HashMap<&str, Vec<&OrgUnit>> = HashMap::new();
        for unit in units.iter() {
            if let Some(parent) = unit.parent() {
                children.entry(parent).or_default().push(unit);
            }
        }

        let mut selected = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&OrgUnit> = units.iter().filter(|unit| unit.key == root).collect();
        while let Some(unit) = queue.pop_front() {
            if !seen.insert(unit.key.as_str()) {
                continue;
            }
            selected.push(unit.clone());
            if let Some(below) = children.get(unit.key.as_str()) {
                queue.extend(below.iter().copied());
            }
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use fieldpulse_core::domain::org_unit::OrgUnit;

    use super::InMemoryOrgUnitSource;
    use crate::repositories::{HierarchyQuery, HierarchyScope, OrgUnitSource};

    fn org() -> Vec<OrgUnit> {
        vec![
            OrgUnit::new("R", None, "Region", "RSM"),
            OrgUnit::new("A", Some("R"), "Area", "ASM"),
            OrgUnit::new("L1", Some("A"), "Leaf 1", "BE"),
            OrgUnit::new("L2", Some("R"), "Leaf 2", "BE"),
            OrgUnit::new("X", None, "Other", "RSM"),
        ]
    }

    fn rooted_at(key: &str) -> HierarchyQuery {
        HierarchyQuery { scope: HierarchyScope::Root(key.to_string()), ..HierarchyQuery::default() }
    }

    #[tokio::test]
    async fn root_scope_returns_subtree_only() {
        let source = InMemoryOrgUnitSource::new(org());

        let units = source.fetch_units(&rooted_at("A")).await.expect("fetch");
        let keys: Vec<&str> = units.iter().map(|unit| unit.key.as_str()).collect();

        assert_eq!(keys, vec!["A", "L1"]);
    }

    #[tokio::test]
    async fn all_scope_returns_every_row() {
        let source = InMemoryOrgUnitSource::new(org());

        let units = source.fetch_units(&HierarchyQuery::default()).await.expect("fetch");

        assert_eq!(units.len(), 5);
    }

    #[tokio::test]
    async fn subtree_walk_terminates_on_cycles() {
        let source = InMemoryOrgUnitSource::new(vec![
            OrgUnit::new("P", Some("Q"), "P", "ASM"),
            OrgUnit::new("Q", Some("P"), "Q", "ASM"),
        ]);

        let units = source.fetch_units(&rooted_at("P")).await.expect("fetch");

        assert_eq!(units.len(), 2);
    }

    #[tokio::test]
    async fn replace_swaps_the_dataset() {
        let source = InMemoryOrgUnitSource::default();
        assert!(source.is_empty().await);

        source.replace(org()).await;

        assert_eq!(source.len().await, 5);
        assert!(source.fetch_units(&rooted_at("missing")).await.expect("fetch").is_empty());
    }
}
