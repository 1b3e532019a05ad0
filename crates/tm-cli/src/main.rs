//! `trialmux`: run a hyperparameter study over a synthetic classifier,
//! spreading trials across a pool of accelerator devices.

mod config;
mod objective;

use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tm_devices::DeviceId;
use tm_optimizer::TrialRunner;
use tracing::info;

use config::{AppConfig, Cli};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "trialmux=debug,tm_optimizer=debug,tm_devices=debug"
    } else {
        "trialmux=info,tm_optimizer=info,tm_devices=warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!("trialmux v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&cli)?;
    info!(
        devices = config.executor.num_devices,
        workers = config.executor.num_workers,
        device_kind = %config.executor.device_kind,
        strategy = %config.study.strategy,
        max_trials = config.study.max_trials,
        "Configuration loaded"
    );

    let runner = TrialRunner::new(config.executor.clone())?;
    let delay = Duration::from_millis(config.study.trial_delay_ms);
    let report = runner.run_study(config.study_config(), |ctx| {
        objective::evaluate(ctx, delay)
    })?;

    let per_device: Vec<usize> = (0..config.executor.num_devices)
        .map(|i| report.trials_on(DeviceId(i)))
        .collect();
    info!(?per_device, "Trials per device");

    let summary = json!({
        "study": report.status.config.name,
        "state": report.status.state,
        "objective_metric": report.status.config.objective_metric,
        "direction": report.status.config.direction,
        "trials_completed": report.status.trials_completed,
        "trials_failed": report.status.trials_failed,
        "trials_per_device": per_device,
        "best": report.best(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
