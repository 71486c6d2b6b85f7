use fieldpulse_core::config::{AppConfig, ConfigError, LoadOptions};
use fieldpulse_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[allow(dead_code)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        database_url = %config.database.url,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    Ok(Application { config, db_pool })
}

#[cfg(test)]
mod tests {
    use fieldpulse_core::config::{ConfigOverrides, LoadOptions};
    use fieldpulse_core::hierarchy::{compute, RootSelector};
    use fieldpulse_db::{
        HierarchyQuery, HierarchyScope, OrgUnitSource, SeedDataset, SqlOrgUnitSource,
        SEED_ROOT_TERRITORY,
    };

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_reporting_tables() {
        let app = bootstrap(overrides("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed with an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('employee', 'sale', 'kpi_score', 'escalation')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables should be queryable after bootstrap");
        assert_eq!(table_count, 4);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_then_seed_supports_a_hierarchy_build() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap");
        SeedDataset::load(&app.db_pool).await.expect("seed");

        let query = HierarchyQuery {
            scope: HierarchyScope::Root(SEED_ROOT_TERRITORY.to_string()),
            ..HierarchyQuery::default()
        };
        let units = SqlOrgUnitSource::new(app.db_pool.clone())
            .fetch_units(&query)
            .await
            .expect("units");
        let hierarchy = compute(
            &units,
            &RootSelector::Key(SEED_ROOT_TERRITORY.to_string()),
            &app.config.hierarchy.to_options(),
        )
        .expect("hierarchy");

        assert_eq!(hierarchy.roots.len(), 1);
        assert!(hierarchy.roots.contains_key(SEED_ROOT_TERRITORY));

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database_url() {
        let result = bootstrap(overrides("postgres://localhost/fieldpulse")).await;

        let Err(BootstrapError::Config(error)) = result else {
            panic!("expected a config error");
        };
        assert!(error.to_string().contains("database.url"));
    }
}
