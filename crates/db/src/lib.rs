pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_in_memory, connect_with_settings, DbPool};
pub use fixtures::{
    SeedDataset, SeedResult, VerificationResult, SEED_PERIOD, SEED_ROOT_TERRITORY,
};
pub use repositories::{
    HierarchyKeying, HierarchyQuery, HierarchyScope, InMemoryOrgUnitSource, OrgUnitSource,
    RepositoryError, SqlOrgUnitSource,
};
