use fieldpulse_core::config::AppConfig;
use fieldpulse_db::migrations;

use crate::commands::{connect, exit, load_config, runtime, CommandResult, StepError};

pub fn run() -> CommandResult {
    let outcome = load_config().and_then(|config| runtime()?.block_on(apply(&config)));
    match outcome {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(step) => CommandResult::from_step("migrate", step),
    }
}

async fn apply(config: &AppConfig) -> Result<(), StepError> {
    let pool = connect(config).await?;
    let result = migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), exit::MIGRATION));
    pool.close().await;
    result
}
