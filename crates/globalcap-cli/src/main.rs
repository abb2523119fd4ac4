mod cli;
mod commands;
mod error;
mod telemetry;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = %error, "globalcap failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    // a missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    commands::run(&cli).await?;
    Ok(ExitCode::SUCCESS)
}
