//! Source publishing
//!
//! Pushing to the tracked branch of the managed repository is what starts the
//! pipeline. There is no separate "start pipeline" call.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{self, CommandSpec};
use crate::error::Result;

/// Where and what to push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    /// Working tree to publish
    pub workdir: PathBuf,
    /// Remote URL of the managed repository
    pub remote_url: String,
    pub branch: String,
    pub message: String,
}

/// Publishes a working tree to the source endpoint
#[async_trait]
pub trait SourcePublisher: Send + Sync {
    async fn publish(&self, request: &PushRequest) -> Result<()>;
}

/// Remote URL for a repository through the `codecommit::` git helper
pub fn codecommit_url(region: &str, profile: &str, repository: &str) -> String {
    format!("codecommit::{}://{}@{}", region, profile, repository)
}

/// Publisher that drives the `git` CLI
#[derive(Debug, Clone)]
pub struct GitPublisher {
    git: String,
}

impl GitPublisher {
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.git = program.into();
        self
    }

    fn git(&self, workdir: &Path) -> CommandSpec {
        CommandSpec::new(&self.git).cwd(workdir)
    }

    pub fn init_command(&self, request: &PushRequest) -> CommandSpec {
        self.git(&request.workdir)
            .arg("init")
            .arg(format!("--initial-branch={}", request.branch))
    }

    pub fn add_command(&self, request: &PushRequest) -> CommandSpec {
        self.git(&request.workdir).args(["add", "--all"])
    }

    pub fn status_command(&self, request: &PushRequest) -> CommandSpec {
        self.git(&request.workdir).args(["status", "--porcelain"])
    }

    pub fn commit_command(&self, request: &PushRequest) -> CommandSpec {
        self.git(&request.workdir)
            .arg("commit")
            .arg("--message")
            .arg(&request.message)
    }

    pub fn push_command(&self, request: &PushRequest) -> CommandSpec {
        self.git(&request.workdir)
            .arg("push")
            .arg(&request.remote_url)
            .arg(format!("HEAD:refs/heads/{}", request.branch))
    }
}

impl Default for GitPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a directory is already a git working tree
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

#[async_trait]
impl SourcePublisher for GitPublisher {
    async fn publish(&self, request: &PushRequest) -> Result<()> {
        if !is_repository(&request.workdir) {
            info!("Initializing repository in {}", request.workdir.display());
            command::run(&self.init_command(request)).await?;
        }

        command::run(&self.add_command(request)).await?;

        let status = command::run(&self.status_command(request)).await?;
        if status.stdout.trim().is_empty() {
            debug!("Nothing to commit in {}", request.workdir.display());
        } else {
            command::run(&self.commit_command(request)).await?;
        }

        info!("Pushing {} to {}", request.branch, request.remote_url);
        command::run(&self.push_command(request)).await?;
        Ok(())
    }
}
