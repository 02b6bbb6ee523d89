//! Key command handlers

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use conveyor_core::key::KeyArn;
use conveyor_core::outputs::scrape_key_arn;
use std::path::{Path, PathBuf};

/// Key subcommands
#[derive(Subcommand)]
pub enum KeyCommands {
    /// Extract the key ARN from a captured pipeline deploy log
    Extract {
        /// Capture file written during bootstrap
        #[arg(default_value = ".conveyor/pipeline-deploy.out")]
        file: PathBuf,
    },
}

pub async fn handle_key_command(command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Extract { file } => {
            let key = extract_from_file(&file).await?;
            println!("{}", key);
            Ok(())
        }
    }
}

async fn extract_from_file(path: &Path) -> Result<KeyArn> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    scrape_key_arn(&text).ok_or_else(|| anyhow!("No KeyArn output found in {}", path.display()))
}
