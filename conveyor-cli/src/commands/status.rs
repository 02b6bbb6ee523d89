//! Status command handler
//!
//! Describes every stack bootstrap manages, across all three accounts.

use anyhow::{Context, Result};
use colored::*;
use conveyor_core::account::Stage;
use conveyor_core::stack::{StackDescription, StackTarget};
use conveyor_engine::ProvisioningEngine;
use conveyor_orchestrator::BootstrapConfig;
use std::sync::Arc;
use tracing::debug;

use crate::config::ConfigArgs;

/// What the engine reported for one managed stack
#[derive(Debug)]
pub struct StackStatus {
    pub target: StackTarget,
    /// `Ok(None)` when the stack does not exist
    pub description: std::result::Result<Option<StackDescription>, String>,
}

pub async fn handle_status(args: &ConfigArgs) -> Result<()> {
    let config = args.to_config();
    config.validate().context("Cannot query status")?;
    let engine: Arc<dyn ProvisioningEngine> = Arc::new(args.engine());

    for status in collect_status(&config, engine).await {
        print_stack(&status);
    }

    Ok(())
}

/// Describes the repository, pipeline, role and application stacks, in that order
pub async fn collect_status(
    config: &BootstrapConfig,
    engine: Arc<dyn ProvisioningEngine>,
) -> Vec<StackStatus> {
    let mut targets = vec![config.repository_target(), config.pipeline_target()];
    targets.extend(
        config
            .role_descriptors()
            .iter()
            .map(|role| config.role_target(role)),
    );
    targets.extend(Stage::ALL.iter().map(|stage| config.application_target(*stage)));

    let mut statuses = Vec::with_capacity(targets.len());
    for target in targets {
        debug!("Describing {}", target);
        let description = engine.describe(&target).await.map_err(|e| e.to_string());
        statuses.push(StackStatus {
            target,
            description,
        });
    }

    statuses
}

/// Print one stack's status and outputs
fn print_stack(status: &StackStatus) {
    let name = status.target.to_string();

    let description = match &status.description {
        Ok(Some(description)) => description,
        Ok(None) => {
            println!("  {} {}", "-".dimmed(), name.bold());
            println!("    Status:   {}", "absent".dimmed());
            return;
        }
        Err(e) => {
            println!("  {} {}", "?".yellow(), name.bold());
            println!("    {}", e.dimmed());
            return;
        }
    };

    let marker = if description.is_complete() {
        "▸".green()
    } else {
        "▸".yellow()
    };
    println!("  {} {}", marker, name.bold());
    println!("    Status:   {}", description.stack_status);
    for output in &description.outputs {
        println!(
            "    {:<9} {}",
            format!("{}:", output.output_key),
            output.output_value.dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::account::Accounts;
    use conveyor_core::outputs::StackOutput;
    use conveyor_orchestrator::testing::{EngineCall, FakeEngine};

    #[tokio::test]
    async fn test_describes_every_managed_stack() {
        let config = BootstrapConfig::new(Accounts::new("111", "222", "333"));
        let engine = Arc::new(FakeEngine::new().with_stack(
            "PipelineStack",
            vec![StackOutput::new("KeyArn", "arn:aws:kms:us-east-1:111:key/abc")],
        ));

        let statuses = collect_status(&config, engine.clone()).await;

        let names: Vec<&str> = statuses.iter().map(|s| s.target.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RepositoryStack",
                "PipelineStack",
                "uat-deployment-role",
                "uat-cross-account-role",
                "prod-deployment-role",
                "prod-cross-account-role",
                "uat-hello-api",
                "prod-hello-api",
            ]
        );

        let pipeline = statuses[1].description.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(pipeline.outputs[0].output_key, "KeyArn");
        assert!(matches!(statuses[0].description, Ok(None)));

        // read-only: nothing but describes
        let calls = engine.calls();
        assert_eq!(calls.len(), 8);
        assert!(calls.iter().all(|c| matches!(c, EngineCall::Describe { .. })));
    }
}
