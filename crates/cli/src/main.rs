//! spotmix: rank spot instance-type combinations by placement score and price.
//!
//! Subcommands:
//! - `optimize`: search combinations of matching instance types
//! - `offerings`: list per-zone spot offerings across regions

mod cli;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use spotmix_core::config::{load_dotenv, Config};
use spotmix_core::CandidateFilter;
use spotmix_ec2::{discover_offerings, Ec2Signals};
use spotmix_optimizer::Optimizer;

use crate::cli::{Cli, Command, OfferingsArgs, OptimizeArgs};
use crate::output::CONSOLE_TOP;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    }
    .context("invalid configuration")?;
    if let Some(region) = cli.region.as_deref() {
        override_region(&mut config, region);
    }

    match cli.command {
        Command::Optimize(args) => optimize(config, &args).await,
        Command::Offerings(args) => offerings(config, &args).await,
    }
}

/// Point the client at `region`. Placement regions follow unless they were
/// configured explicitly.
fn override_region(config: &mut Config, region: &str) {
    let placement = &mut config.optimizer.placement;
    if placement.regions.len() == 1 && placement.regions[0] == config.aws.region {
        placement.regions = vec![region.to_string()];
    }
    config.aws.region = region.to_string();
}

async fn optimize(mut config: Config, args: &OptimizeArgs) -> Result<()> {
    let filter = args.filter(&config.catalog)?;
    args.apply(&mut config.optimizer);
    config.validate().context("invalid configuration")?;
    config.log_summary();
    debug!(config = %config.redacted_summary(), "Effective configuration");

    let signals = Arc::new(
        Ec2Signals::new(&config.aws)
            .await
            .context("failed to initialise EC2 client")?,
    );
    let optimizer = Optimizer::new(
        signals.clone(),
        signals.clone(),
        signals,
        config.optimizer.clone(),
    );

    log_filter(&filter);
    let report = optimizer.run_until(&filter, interrupted()).await?;

    if report.is_empty() {
        println!("No combination could be scored ({}).", report.stats.stop);
    } else {
        println!("Top combinations:");
        for entry in report.entries.iter().take(CONSOLE_TOP) {
            println!("  {}", output::summary_line(entry));
        }
    }

    let path = args.output_path();
    output::write_report(&report, args.format, &path)?;

    let stats = &report.stats;
    println!(
        "Evaluated {} combinations of {} candidates: {} scored, {} skipped.",
        stats.attempted, stats.candidates, stats.scored, stats.skipped
    );
    if stats.is_partial() {
        println!("Stopped early: {}. Results are partial.", stats.stop);
    }
    println!("Results saved to {}", path.display());
    Ok(())
}

async fn offerings(config: Config, args: &OfferingsArgs) -> Result<()> {
    let filter = CandidateFilter::new(args.shape.constraint()?);
    config.aws.validate().context("invalid configuration")?;

    let signals = Ec2Signals::new(&config.aws)
        .await
        .context("failed to initialise EC2 client")?;

    let regions = if args.regions.is_empty() {
        signals
            .opted_in_regions()
            .await
            .context("failed to list regions")?
    } else {
        args.regions.clone()
    };
    info!(regions = regions.len(), "Scanning regions for spot offerings");

    let rows = discover_offerings(&signals, &regions, &filter, args.concurrency).await;
    output::write_offerings(&rows, &args.output)?;

    println!("{} offerings written to {}", rows.len(), args.output.display());
    Ok(())
}

fn log_filter(filter: &CandidateFilter) {
    info!(
        constraint = ?filter.constraint,
        families = ?filter.family_prefixes,
        "Searching spot combinations"
    );
}

/// Resolves on Ctrl-C. If the handler cannot be installed the run simply
/// continues to its configured budgets.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Interrupt received, stopping with partial results"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await
        }
    }
}
