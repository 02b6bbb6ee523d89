//! Bootstrap configuration
//!
//! Everything a run needs is collected here and validated once, before the
//! orchestrator is built. Account identifiers and profiles are never read
//! from the environment after that point.

use conveyor_core::account::{Accounts, Stage};
use conveyor_core::pipeline::{PipelineDefinition, application_stack_name, repository_name};
use conveyor_core::role::RoleDescriptor;
use conveyor_core::stack::{StackSource, StackTarget};
use conveyor_core::template::template_file_name;
use conveyor_engine::PushRequest;
use conveyor_engine::source::codecommit_url;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Credentials profile per account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profiles {
    pub tools: String,
    pub uat: String,
    pub prod: String,
}

impl Profiles {
    pub fn for_stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Uat => &self.uat,
            Stage::Prod => &self.prod,
        }
    }
}

impl Default for Profiles {
    fn default() -> Self {
        Self {
            tools: "tools".to_string(),
            uat: "uat".to_string(),
            prod: "prod".to_string(),
        }
    }
}

/// How the key ARN is recovered after the channel stack deploys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyLookup {
    /// Ask the engine for the stack's outputs, scrape the deploy log if absent
    #[default]
    Structured,
    /// Only scrape the deploy log
    Text,
}

impl FromStr for KeyLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structured" => Ok(KeyLookup::Structured),
            "text" => Ok(KeyLookup::Text),
            other => Err(format!(
                "unknown key lookup '{}', expected 'structured' or 'text'",
                other
            )),
        }
    }
}

impl fmt::Display for KeyLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyLookup::Structured => write!(f, "structured"),
            KeyLookup::Text => write!(f, "text"),
        }
    }
}

/// Configuration for bootstrap and teardown runs
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub accounts: Accounts,
    pub profiles: Profiles,
    pub region: String,

    /// Directory holding the rendered role stack templates
    pub template_dir: PathBuf,

    /// Root of the CDK app defining the repository and pipeline stacks
    pub cdk_app_dir: PathBuf,

    pub repository_stack: String,
    pub pipeline_stack: String,

    /// Base name of the application stack in each downstream account
    pub application_stack: String,

    /// Where the pipeline deploy log is persisted for key extraction
    pub capture_file: PathBuf,

    /// Working tree pushed to the source repository
    pub source_dir: PathBuf,
    pub branch: String,
    pub commit_message: String,

    pub key_lookup: KeyLookup,

    /// Grant the pipeline deploy actions broad IAM rights
    pub admin_permissions: bool,

    /// Artifact bucket to empty on teardown; looked up from the pipeline
    /// stack outputs when unset
    pub artifact_bucket: Option<String>,
}

impl BootstrapConfig {
    /// Creates a configuration with defaults for everything but the accounts
    pub fn new(accounts: Accounts) -> Self {
        Self {
            accounts,
            profiles: Profiles::default(),
            region: "us-east-1".to_string(),
            template_dir: PathBuf::from("stacks"),
            cdk_app_dir: PathBuf::from("."),
            repository_stack: "RepositoryStack".to_string(),
            pipeline_stack: "PipelineStack".to_string(),
            application_stack: "hello-api".to_string(),
            capture_file: PathBuf::from(".conveyor/pipeline-deploy.out"),
            source_dir: PathBuf::from("."),
            branch: "main".to_string(),
            commit_message: "Initial commit".to_string(),
            key_lookup: KeyLookup::default(),
            admin_permissions: false,
            artifact_bucket: None,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.accounts.missing();
        if !missing.is_empty() {
            return Err(ConfigError::MissingAccounts(missing));
        }

        let required = [
            ("tools profile", &self.profiles.tools),
            ("uat profile", &self.profiles.uat),
            ("prod profile", &self.profiles.prod),
            ("region", &self.region),
            ("repository stack", &self.repository_stack),
            ("pipeline stack", &self.pipeline_stack),
            ("application stack", &self.application_stack),
            ("branch", &self.branch),
            ("commit message", &self.commit_message),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(name));
            }
        }

        Ok(())
    }

    /// The four role descriptors, without a key
    pub fn role_descriptors(&self) -> Vec<RoleDescriptor> {
        RoleDescriptor::all_for(&self.accounts)
    }

    /// Stack owning a role in its downstream account
    pub fn role_target(&self, role: &RoleDescriptor) -> StackTarget {
        let template = self.template_dir.join(template_file_name(role.kind));
        StackTarget::new(
            role.stack_name(),
            self.profiles.for_stage(role.stage),
            StackSource::Template(template),
        )
        .with_region(&self.region)
    }

    pub fn repository_target(&self) -> StackTarget {
        self.tools_cdk_target(&self.repository_stack)
    }

    pub fn pipeline_target(&self) -> StackTarget {
        self.tools_cdk_target(&self.pipeline_stack)
    }

    /// Application stack the pipeline deploys into a stage
    pub fn application_target(&self, stage: Stage) -> StackTarget {
        StackTarget::new(
            application_stack_name(stage, &self.application_stack),
            self.profiles.for_stage(stage),
            StackSource::External,
        )
        .with_region(&self.region)
    }

    pub fn pipeline_definition(&self) -> PipelineDefinition {
        PipelineDefinition::new(
            &self.accounts,
            &self.application_stack,
            &self.branch,
            self.admin_permissions,
        )
    }

    /// Remote URL of the repository owned by the tools account
    pub fn source_endpoint(&self) -> String {
        codecommit_url(
            &self.region,
            &self.profiles.tools,
            &repository_name(&self.accounts.tools),
        )
    }

    pub fn push_request(&self) -> PushRequest {
        PushRequest {
            workdir: self.source_dir.clone(),
            remote_url: self.source_endpoint(),
            branch: self.branch.clone(),
            message: self.commit_message.clone(),
        }
    }

    fn tools_cdk_target(&self, name: &str) -> StackTarget {
        StackTarget::new(
            name,
            &self.profiles.tools,
            StackSource::Cdk {
                app_dir: self.cdk_app_dir.clone(),
            },
        )
        .with_region(&self.region)
    }
}
