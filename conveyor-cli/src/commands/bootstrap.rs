//! Bootstrap command handler

use anyhow::{Context, Result};
use colored::*;
use conveyor_engine::{ProvisioningEngine, SourcePublisher};
use conveyor_orchestrator::{BootstrapState, Bootstrapper, RunReport};
use std::sync::Arc;

use crate::config::ConfigArgs;

/// Run a full bootstrap and print its report
///
/// # Arguments
/// * `args` - Account, profile and stack settings
/// * `json` - Emit the run report as JSON instead of text
pub async fn handle_bootstrap(args: &ConfigArgs, json: bool) -> Result<()> {
    let engine: Arc<dyn ProvisioningEngine> = Arc::new(args.engine());
    let publisher: Arc<dyn SourcePublisher> = Arc::new(args.publisher());

    let mut bootstrapper = Bootstrapper::new(args.to_config(), engine, publisher)
        .context("Cannot start bootstrap")?;

    let result = bootstrapper.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(bootstrapper.report())?);
    } else {
        print_report(bootstrapper.report());
    }

    result.context("Bootstrap failed")?;
    Ok(())
}

/// Print a run report
fn print_report(report: &RunReport) {
    println!();
    println!("{} {}", "Run".bold(), report.run_id.to_string().dimmed());

    for transition in &report.transitions {
        let at = transition.at.format("%H:%M:%S").to_string();
        println!(
            "  {} {} {} {}",
            at.dimmed(),
            transition.from,
            "→".cyan(),
            colorize_state(transition.to)
        );
        if let Some(error) = &transition.error {
            println!("    {}", error.red());
        }
    }

    if !report.role_arns.is_empty() {
        println!();
        println!("{}", "Cross-account roles:".bold());
        for arn in &report.role_arns {
            println!("  {}", arn);
        }
    }

    if let Some(key) = &report.key_arn {
        println!();
        println!("{} {}", "Key ARN:".bold(), key);
    }

    println!();
    match report.final_state() {
        BootstrapState::Done => println!("{}", "✓ Bootstrap complete".green().bold()),
        state => println!("{} {}", "✗ Bootstrap stopped at".red().bold(), state),
    }
}

/// Colorize a bootstrap state for display
fn colorize_state(state: BootstrapState) -> ColoredString {
    match state {
        BootstrapState::Done => state.to_string().green(),
        BootstrapState::Failed => state.to_string().red(),
        _ => state.to_string().normal(),
    }
}
