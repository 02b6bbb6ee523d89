//! Release pipeline layout
//!
//! The pipeline itself is synthesized by the CDK app. This module fixes the
//! parts the bootstrap depends on: the repository it watches, the stage order,
//! and which downstream roles each deploy stage assumes. Those values reach the
//! app as context parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::account::{AccountId, Accounts, Stage};
use crate::role::{RoleKind, role_arn};

/// Name of the source repository owned by a tools account
pub fn repository_name(tools: &AccountId) -> String {
    format!("repo-{}", tools)
}

/// Name of the application stack in a downstream account
pub fn application_stack_name(stage: Stage, base: &str) -> String {
    format!("{}-{}", stage.slug(), base)
}

/// One action inside a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineAction {
    /// Pull the tracked branch from the managed repository
    Source { repository: String, branch: String },
    /// Package the application and synthesize per-stage templates
    Build { project: String },
    /// Create or update the application stack in a downstream account
    Deploy {
        stage: Stage,
        account: AccountId,
        stack_name: String,
        /// Role the pipeline assumes to reach the account
        cross_account_role_arn: String,
        /// Role the engine assumes to change resources
        deployment_role_arn: String,
        /// Grant the deploy action broad IAM rights
        admin_permissions: bool,
    },
}

/// A named pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub name: String,
    pub actions: Vec<PipelineAction>,
}

/// Source → Build → Deploy-Uat → Deploy-Prod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub accounts: Accounts,
    pub repository: String,
    pub branch: String,
    pub application_stack: String,
    pub admin_permissions: bool,
    pub stages: Vec<PipelineStage>,
}

impl PipelineDefinition {
    pub fn new(
        accounts: &Accounts,
        application_stack: &str,
        branch: &str,
        admin_permissions: bool,
    ) -> Self {
        let repository = repository_name(&accounts.tools);

        let mut stages = vec![
            PipelineStage {
                name: "Source".to_string(),
                actions: vec![PipelineAction::Source {
                    repository: repository.clone(),
                    branch: branch.to_string(),
                }],
            },
            PipelineStage {
                name: "Build".to_string(),
                actions: vec![PipelineAction::Build {
                    project: format!("{}-build", application_stack),
                }],
            },
        ];

        for stage in Stage::ALL {
            let account = accounts.downstream(stage).clone();
            stages.push(PipelineStage {
                name: deploy_stage_name(stage),
                actions: vec![PipelineAction::Deploy {
                    stage,
                    stack_name: application_stack_name(stage, application_stack),
                    cross_account_role_arn: role_arn(&account, RoleKind::CrossAccountRole),
                    deployment_role_arn: role_arn(&account, RoleKind::DeploymentRole),
                    account,
                    admin_permissions,
                }],
            });
        }

        Self {
            accounts: accounts.clone(),
            repository,
            branch: branch.to_string(),
            application_stack: application_stack.to_string(),
            admin_permissions,
            stages,
        }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// The deploy stage for a downstream stage
    pub fn deploy_stage(&self, stage: Stage) -> Option<&PipelineStage> {
        let name = deploy_stage_name(stage);
        self.stages.iter().find(|s| s.name == name)
    }

    /// Role ARNs assumed while deploying to a stage
    pub fn assumed_roles(&self, stage: Stage) -> Vec<&str> {
        self.deploy_stage(stage)
            .into_iter()
            .flat_map(|s| s.actions.iter())
            .flat_map(|action| match action {
                PipelineAction::Deploy {
                    cross_account_role_arn,
                    deployment_role_arn,
                    ..
                } => vec![cross_account_role_arn.as_str(), deployment_role_arn.as_str()],
                _ => Vec::new(),
            })
            .collect()
    }

    /// Context parameters handed to the CDK app
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        ctx.insert("toolsAccount".to_string(), self.accounts.tools.to_string());
        ctx.insert("uatAccount".to_string(), self.accounts.uat.to_string());
        ctx.insert("prodAccount".to_string(), self.accounts.prod.to_string());
        ctx.insert("repositoryName".to_string(), self.repository.clone());
        ctx.insert("branch".to_string(), self.branch.clone());
        ctx.insert(
            "applicationStack".to_string(),
            self.application_stack.clone(),
        );
        ctx.insert(
            "adminPermissions".to_string(),
            self.admin_permissions.to_string(),
        );

        for pipeline_stage in &self.stages {
            for action in &pipeline_stage.actions {
                if let PipelineAction::Deploy {
                    stage,
                    cross_account_role_arn,
                    deployment_role_arn,
                    ..
                } = action
                {
                    ctx.insert(
                        format!("{}CrossAccountRoleArn", stage.slug()),
                        cross_account_role_arn.clone(),
                    );
                    ctx.insert(
                        format!("{}DeploymentRoleArn", stage.slug()),
                        deployment_role_arn.clone(),
                    );
                }
            }
        }

        ctx
    }
}

fn deploy_stage_name(stage: Stage) -> String {
    format!("Deploy-{}", stage.name())
}
