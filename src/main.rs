mod auth;
mod batch;
mod cli;
mod config;
mod error;
mod output;
mod pipeline;
mod process;
mod providers;
mod stages;
mod tools;
mod workspace;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use env_logger::Env;
use log::info;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(Env::default().filter_or("LOG_LEVEL", "info")).init();

    // the orchestrator already printed it
    if std::env::var_os(pipeline::CHILD_STAGE_ENV).is_none() {
        output::print_banner();
    }

    let cli = Cli::parse();
    info!("Starting tfcollect - Terraform Collection Pipeline");

    if cli.execute().await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
