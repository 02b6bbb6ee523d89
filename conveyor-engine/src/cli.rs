//! CLI-backed provisioning engine
//!
//! Drives CloudFormation through the `aws` CLI and CDK apps through `npx cdk`.
//! Template stacks deploy with `--no-fail-on-empty-changeset` so redeploying
//! an unchanged stack succeeds as a no-op.

use async_trait::async_trait;
use conveyor_core::stack::{
    DeployOutcome, DeployRequest, StackDescription, StackSource, StackTarget,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::command::{self, CommandSpec};
use crate::error::{EngineError, Result};
use crate::provisioning::ProvisioningEngine;

#[derive(Debug, Deserialize)]
struct DescribeStacksResponse {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackDescription>,
}

/// Provisioning engine that shells out to the `aws` and `cdk` CLIs
#[derive(Debug, Clone)]
pub struct CliEngine {
    aws: String,
    /// Program plus leading arguments, e.g. `npx cdk`
    cdk: Vec<String>,
}

impl CliEngine {
    pub fn new() -> Self {
        Self {
            aws: "aws".to_string(),
            cdk: vec!["npx".to_string(), "cdk".to_string()],
        }
    }

    /// Overrides the `aws` executable
    pub fn with_aws_program(mut self, program: impl Into<String>) -> Self {
        self.aws = program.into();
        self
    }

    /// Overrides the CDK command, split on whitespace
    pub fn with_cdk_command(mut self, command: &str) -> Self {
        let parts: Vec<String> = command.split_whitespace().map(String::from).collect();
        if !parts.is_empty() {
            self.cdk = parts;
        }
        self
    }

    fn aws_command(&self, target: &StackTarget) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.aws);
        spec = spec.arg("--profile").arg(&target.profile);
        if let Some(region) = &target.region {
            spec = spec.arg("--region").arg(region);
        }
        spec
    }

    fn cdk_command(&self, target: &StackTarget, app_dir: &std::path::Path) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.cdk[0])
            .args(self.cdk[1..].iter().cloned())
            .cwd(app_dir);
        if let Some(region) = &target.region {
            spec = spec.env("AWS_REGION", region);
        }
        spec
    }

    /// Command that creates or updates a stack
    pub fn deploy_command(&self, request: &DeployRequest) -> Result<CommandSpec> {
        let target = &request.target;

        match &target.source {
            StackSource::Template(path) => {
                let mut spec = self
                    .aws_command(target)
                    .args(["cloudformation", "deploy"])
                    .arg("--template-file")
                    .arg(path.to_string_lossy())
                    .arg("--stack-name")
                    .arg(&target.name)
                    .arg("--no-fail-on-empty-changeset");

                if !request.capabilities.is_empty() {
                    spec = spec
                        .arg("--capabilities")
                        .args(request.capabilities.iter().map(|c| c.as_str()));
                }

                if !request.parameters.is_empty() {
                    spec = spec.arg("--parameter-overrides").args(
                        request
                            .parameters
                            .iter()
                            .map(|(key, value)| format!("{}={}", key, value)),
                    );
                }

                Ok(spec)
            }
            StackSource::Cdk { app_dir } => {
                let mut spec = self
                    .cdk_command(target, app_dir)
                    .arg("deploy")
                    .arg(&target.name)
                    .arg("--profile")
                    .arg(&target.profile)
                    .arg("--require-approval")
                    .arg("never");

                for (key, value) in &request.parameters {
                    spec = spec.arg("--context").arg(format!("{}={}", key, value));
                }

                Ok(spec)
            }
            StackSource::External => Err(EngineError::Unsupported {
                stack: target.name.clone(),
                operation: "deployed",
                reason: "stack is managed outside this tool".to_string(),
            }),
        }
    }

    /// Command that describes a stack as JSON
    pub fn describe_command(&self, target: &StackTarget) -> CommandSpec {
        self.aws_command(target)
            .args(["cloudformation", "describe-stacks"])
            .arg("--stack-name")
            .arg(&target.name)
            .arg("--output")
            .arg("json")
    }

    /// Command that deletes a stack
    pub fn delete_command(&self, target: &StackTarget) -> CommandSpec {
        match &target.source {
            StackSource::Cdk { app_dir } => self
                .cdk_command(target, app_dir)
                .arg("destroy")
                .arg(&target.name)
                .arg("--profile")
                .arg(&target.profile)
                .arg("--force"),
            StackSource::Template(_) | StackSource::External => self
                .aws_command(target)
                .args(["cloudformation", "delete-stack"])
                .arg("--stack-name")
                .arg(&target.name),
        }
    }

    /// Command that empties a bucket
    pub fn empty_bucket_command(&self, profile: &str, bucket: &str) -> CommandSpec {
        CommandSpec::new(&self.aws)
            .arg("--profile")
            .arg(profile)
            .args(["s3", "rm"])
            .arg(format!("s3://{}", bucket))
            .arg("--recursive")
    }
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `describe-stacks` JSON into the first stack description
pub fn parse_describe_output(command: &str, json: &str) -> Result<Option<StackDescription>> {
    let response: DescribeStacksResponse =
        serde_json::from_str(json).map_err(|e| EngineError::ParseError {
            command: command.to_string(),
            message: e.to_string(),
        })?;
    Ok(response.stacks.into_iter().next())
}

#[async_trait]
impl ProvisioningEngine for CliEngine {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let spec = self.deploy_command(request)?;
        info!("Deploying stack {}", request.target);

        let output = command::run(&spec).await?;

        info!("Stack {} deployed", request.target);
        Ok(DeployOutcome {
            stack: request.target.name.clone(),
            log: output.combined(),
        })
    }

    async fn describe(&self, target: &StackTarget) -> Result<Option<StackDescription>> {
        let spec = self.describe_command(target);

        match command::run(&spec).await {
            Ok(output) => parse_describe_output(&spec.to_string(), &output.stdout),
            Err(e) if e.is_missing_stack() => {
                debug!("Stack {} does not exist", target);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, target: &StackTarget) -> Result<()> {
        let spec = self.delete_command(target);
        info!("Deleting stack {}", target);
        command::run(&spec).await?;
        Ok(())
    }

    async fn empty_bucket(&self, profile: &str, bucket: &str) -> Result<()> {
        let spec = self.empty_bucket_command(profile, bucket);
        info!("Emptying bucket {} ({})", bucket, profile);
        command::run(&spec).await?;
        Ok(())
    }
}
