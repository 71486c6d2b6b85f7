pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::hierarchy::HierarchyArgs;

#[derive(Debug, Parser)]
#[command(
    name = "fieldpulse",
    about = "Fieldpulse operator CLI",
    long_about = "Apply migrations, load demo data, inspect configuration, and print computed sales-force hierarchies.",
    after_help = "Examples:\n  fieldpulse migrate\n  fieldpulse seed\n  fieldpulse hierarchy --root T-RSM-N --period 2024-03\n  fieldpulse hierarchy --fixture units.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo organisation, KPI scores, and sales")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Compute a hierarchy and print it as JSON")]
    Hierarchy {
        #[arg(long, help = "Root key; every detached row becomes a root when omitted")]
        root: Option<String>,
        #[arg(long, default_value = "territory", help = "Parent relation: territory|manager")]
        keying: String,
        #[arg(long, help = "KPI period (YYYY-MM)")]
        period: Option<String>,
        #[arg(long, help = "First sale date to include (YYYY-MM-DD)")]
        from: Option<String>,
        #[arg(long, help = "Last sale date to include (YYYY-MM-DD)")]
        to: Option<String>,
        #[arg(long, default_value = "amount", help = "Sales measure: amount|quantity")]
        measure: String,
        #[arg(long, help = "Zero metrics for roles outside hierarchy.leaf_roles")]
        gate_by_role: bool,
        #[arg(long, help = "Read flat org units from a JSON file instead of the database")]
        fixture: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Hierarchy { root, keying, period, from, to, measure, gate_by_role, fixture } => {
            commands::hierarchy::run(&HierarchyArgs {
                root,
                keying,
                period,
                from,
                to,
                measure,
                gate_by_role,
                fixture,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
