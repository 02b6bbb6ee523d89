//! Template command handlers
//!
//! Renders the role stack templates the bootstrap deploys into each
//! downstream account.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use conveyor_orchestrator::write_role_templates;
use std::path::PathBuf;

/// Template subcommands
#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Write the deployment and cross-account role templates
    Roles {
        /// Output directory for generated templates
        #[arg(short, long, default_value = "stacks")]
        output: PathBuf,
    },
}

/// Handle template commands
///
/// # Arguments
/// * `command` - The template command to execute
pub async fn handle_template_command(command: TemplateCommands) -> Result<()> {
    match command {
        TemplateCommands::Roles { output } => {
            let written = write_role_templates(&output, true)
                .await
                .context("Failed to render role templates")?;
            for path in written {
                println!("{} {}", "Created".green(), path.display());
            }
            Ok(())
        }
    }
}
