use std::process::ExitCode;

fn main() -> ExitCode {
    fieldpulse_cli::run()
}
