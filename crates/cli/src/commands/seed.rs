use fieldpulse_core::config::AppConfig;
use fieldpulse_db::{migrations, DbPool, SeedDataset, SeedResult, VerificationResult};

use crate::commands::{connect, exit, load_config, runtime, CommandResult, StepError};

pub fn run() -> CommandResult {
    let outcome = load_config().and_then(|config| runtime()?.block_on(seed(&config)));
    match outcome {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "seed dataset loaded: {} employees under {} with KPI period {}",
                seeded.employees.len(),
                seeded.root_territory,
                seeded.period
            ),
        ),
        Err(step) => CommandResult::from_step("seed", step),
    }
}

async fn seed(config: &AppConfig) -> Result<SeedResult, StepError> {
    let pool = connect(config).await?;
    let result = load_and_verify(&pool).await;
    pool.close().await;
    result
}

async fn load_and_verify(pool: &DbPool) -> Result<SeedResult, StepError> {
    migrations::run_pending(pool)
        .await
        .map_err(|error| ("migration", error.to_string(), exit::MIGRATION))?;
    let seeded = SeedDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), exit::MIGRATION))?;
    let verification = SeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), exit::VERIFICATION))?;
    if !verification.all_present {
        return Err(("seed_verification", failure_message(&verification), exit::VERIFICATION));
    }
    Ok(seeded)
}

fn failure_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
