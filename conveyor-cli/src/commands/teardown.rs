//! Teardown command handler

use anyhow::{Context, Result, bail};
use colored::*;
use conveyor_orchestrator::{Teardown, TeardownReport};
use std::sync::Arc;

use crate::config::ConfigArgs;

/// Tear down a bootstrap and report every step
///
/// Fails when any step failed, after all steps have run.
pub async fn handle_teardown(args: &ConfigArgs) -> Result<()> {
    let teardown =
        Teardown::new(args.to_config(), Arc::new(args.engine())).context("Cannot start teardown")?;

    let report = teardown.run().await;
    print_report(&report);

    let failures = report.failures().len();
    if failures > 0 {
        bail!(
            "{} teardown step(s) failed; remaining resources need manual cleanup",
            failures
        );
    }

    Ok(())
}

fn print_report(report: &TeardownReport) {
    println!();
    for step in &report.steps {
        match &step.error {
            None => println!("  {} {}", "✓".green(), step.label),
            Some(error) => {
                println!("  {} {}", "✗".red(), step.label);
                println!("    {}", error.dimmed());
            }
        }
    }
    println!();
}
