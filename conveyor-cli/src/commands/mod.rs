//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod bootstrap;
mod key;
mod status;
mod teardown;
mod template;

pub use key::KeyCommands;
pub use template::TemplateCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::ConfigArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy roles, artifact channel and pipeline, then push the source
    Bootstrap {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove everything bootstrap created, best effort
    Teardown {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the state of every managed stack
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Key ARN utilities
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Stack template rendering
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Bootstrap { config, json } => bootstrap::handle_bootstrap(&config, json).await,
        Commands::Teardown { config } => teardown::handle_teardown(&config).await,
        Commands::Status { config } => status::handle_status(&config).await,
        Commands::Key { command } => key::handle_key_command(command).await,
        Commands::Template { command } => template::handle_template_command(command).await,
    }
}
