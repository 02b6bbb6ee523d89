//! Configuration module
//!
//! Command-line arguments (with environment fallbacks) that build the
//! orchestrator configuration and the CLI-backed engine and publisher.

use clap::Args;
use conveyor_core::account::Accounts;
use conveyor_engine::{CliEngine, GitPublisher};
use conveyor_orchestrator::{BootstrapConfig, KeyLookup, Profiles};
use std::path::PathBuf;

/// Settings shared by commands that touch the accounts
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Account hosting the repository, artifact channel and pipeline
    #[arg(long, env = "TOOLS_ACCOUNT_ID")]
    pub tools_account: Option<String>,

    /// UAT account
    #[arg(long, env = "UAT_ACCOUNT_ID")]
    pub uat_account: Option<String>,

    /// Production account
    #[arg(long, env = "PROD_ACCOUNT_ID")]
    pub prod_account: Option<String>,

    /// Credentials profile for the tools account
    #[arg(long, env = "TOOLS_PROFILE", default_value = "tools")]
    pub tools_profile: String,

    /// Credentials profile for the UAT account
    #[arg(long, env = "UAT_PROFILE", default_value = "uat")]
    pub uat_profile: String,

    /// Credentials profile for the production account
    #[arg(long, env = "PROD_PROFILE", default_value = "prod")]
    pub prod_profile: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Directory holding the role stack templates
    #[arg(long, default_value = "stacks")]
    pub template_dir: PathBuf,

    /// CDK app defining the repository and pipeline stacks
    #[arg(long, env = "CONVEYOR_CDK_APP", default_value = ".")]
    pub cdk_app_dir: PathBuf,

    #[arg(long, default_value = "RepositoryStack")]
    pub repository_stack: String,

    #[arg(long, default_value = "PipelineStack")]
    pub pipeline_stack: String,

    /// Base name of the application stack in each downstream account
    #[arg(long, default_value = "hello-api")]
    pub application_stack: String,

    /// File the pipeline deploy log is written to
    #[arg(
        long,
        env = "CONVEYOR_CAPTURE_FILE",
        default_value = ".conveyor/pipeline-deploy.out"
    )]
    pub capture_file: PathBuf,

    /// Working tree pushed to the source repository
    #[arg(long, default_value = ".")]
    pub source_dir: PathBuf,

    #[arg(long, default_value = "main")]
    pub branch: String,

    #[arg(long, default_value = "Initial commit")]
    pub commit_message: String,

    /// How to recover the key ARN: structured or text
    #[arg(long, default_value = "structured")]
    pub key_lookup: KeyLookup,

    /// Grant the pipeline deploy actions broad IAM rights
    #[arg(long)]
    pub admin_permissions: bool,

    /// Artifact bucket to empty on teardown (default: pipeline stack output)
    #[arg(long, env = "CONVEYOR_ARTIFACT_BUCKET")]
    pub artifact_bucket: Option<String>,

    /// `aws` executable
    #[arg(long, default_value = "aws")]
    pub aws_program: String,

    /// CDK command line
    #[arg(long, default_value = "npx cdk")]
    pub cdk_command: String,

    /// `git` executable
    #[arg(long, default_value = "git")]
    pub git_program: String,
}

impl ConfigArgs {
    /// Builds the orchestrator configuration
    ///
    /// Unset accounts become empty identifiers; the orchestrator rejects them
    /// before issuing any engine call.
    pub fn to_config(&self) -> BootstrapConfig {
        let accounts = Accounts::new(
            self.tools_account.clone().unwrap_or_default(),
            self.uat_account.clone().unwrap_or_default(),
            self.prod_account.clone().unwrap_or_default(),
        );

        let mut config = BootstrapConfig::new(accounts);
        config.profiles = Profiles {
            tools: self.tools_profile.clone(),
            uat: self.uat_profile.clone(),
            prod: self.prod_profile.clone(),
        };
        config.region = self.region.clone();
        config.template_dir = self.template_dir.clone();
        config.cdk_app_dir = self.cdk_app_dir.clone();
        config.repository_stack = self.repository_stack.clone();
        config.pipeline_stack = self.pipeline_stack.clone();
        config.application_stack = self.application_stack.clone();
        config.capture_file = self.capture_file.clone();
        config.source_dir = self.source_dir.clone();
        config.branch = self.branch.clone();
        config.commit_message = self.commit_message.clone();
        config.key_lookup = self.key_lookup;
        config.admin_permissions = self.admin_permissions;
        config.artifact_bucket = self.artifact_bucket.clone();
        config
    }

    pub fn engine(&self) -> CliEngine {
        CliEngine::new()
            .with_aws_program(&self.aws_program)
            .with_cdk_command(&self.cdk_command)
    }

    pub fn publisher(&self) -> GitPublisher {
        GitPublisher::new().with_program(&self.git_program)
    }
}
