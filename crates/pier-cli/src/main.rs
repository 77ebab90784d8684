//! # pier
//!
//! Container entry point. Prepares the runtime environment (configuration,
//! source checkout, shared-directory links, rendered config files), then
//! replaces itself with the application command.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use pier_common::constants::APP_NAME;
use pier_common::env::Environment;
use pier_core::handover::SystemIdentity;
use pier_runtime::error::BootstrapError;
use pier_runtime::orchestrator::{self, Orchestrator};

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_tracing(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<BootstrapError>()
                .map_or(1, BootstrapError::exit_code);
            tracing::error!(error = %format!("{err:#}"), code, "bootstrap aborted");
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let (options, command) = cli.into_parts();
    tracing::info!(
        app = APP_NAME,
        version = env!("CARGO_PKG_VERSION"),
        config = %options.config_path.display(),
        "bootstrap starting"
    );
    let prepared = Orchestrator::new(options).prepare(Environment::capture(), command)?;
    orchestrator::finish(prepared.termination, &SystemIdentity)?;
    Ok(())
}
