use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use borgbahm::cli::Cli;
use borgbahm::config::{BahmPaths, Mode, Settings};
use borgbahm::engine::BorgEngine;
use borgbahm::logging::init_logging;
use borgbahm::mount::SystemMounter;
use borgbahm::orchestrator::{Orchestrator, RunReport};
use borgbahm::process::SystemRunner;
use borgbahm::BahmResult;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity()).context("Could not set up logging")?;

    match run(cli) {
        Ok(report) => {
            match report.mode {
                Mode::Backup => info!("Backup archive {} created", report.archive),
                Mode::Restore => info!("Restored from backup archive {}", report.archive),
            }
            if !report.warnings.is_empty() {
                warn!(
                    "Finished with {} warning(s); the repository may hold more archives than the retention policy allows",
                    report.warnings.len()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("{}", err);
            let code = u8::try_from(err.exit_code()).unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}

fn run(cli: Cli) -> BahmResult<RunReport> {
    let paths = BahmPaths::new()?;
    let settings = Settings::load(cli.config.as_deref(), &paths)?;
    let config = cli.into_run_config()?;

    let runner = SystemRunner::new(config.verbosity);
    let mounter = SystemMounter::new(runner, &settings);
    let engine = BorgEngine::new(
        runner,
        config.repository_path(),
        config.passphrase.clone(),
        settings.clone(),
        config.verbosity,
    );

    Orchestrator::new(&config, &settings, &mounter, &engine).run()
}
