//! Bootstrap orchestrator
//!
//! Drives the two-pass role bootstrap:
//!
//! 1. Deploy the four role stacks without a key so their ARNs exist.
//! 2. Deploy the repository, then the artifact channel and pipeline, which
//!    reference those ARNs. Persist the deploy log.
//! 3. Recover the key ARN the channel stack published.
//! 4. Redeploy the same four role stacks with the key ARN, granting decrypt.
//! 5. Push the source, which triggers the pipeline's first run.
//!
//! Any failure moves the run to `Failed` and stops it. Nothing already
//! applied is rolled back; teardown is the recovery path.

use conveyor_core::key::KeyArn;
use conveyor_core::outputs::{KEY_ARN_OUTPUT, find_output, scrape_key_arn};
use conveyor_core::role::RoleDescriptor;
use conveyor_core::stack::{DeployRequest, StackTarget};
use conveyor_engine::{EngineError, ProvisioningEngine, SourcePublisher};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::barrier::{BranchError, BranchOutcome, PhaseGroup};
use crate::config::{BootstrapConfig, KeyLookup};
use crate::error::{BootstrapError, Result};
use crate::state::{BootstrapState, RunReport};
use crate::templates::write_role_templates;

/// Bootstrap state machine
pub struct Bootstrapper {
    config: Arc<BootstrapConfig>,
    engine: Arc<dyn ProvisioningEngine>,
    publisher: Arc<dyn SourcePublisher>,
    state: BootstrapState,
    key_arn: Option<KeyArn>,
    report: RunReport,
}

impl Bootstrapper {
    /// Creates a bootstrapper after validating the configuration
    ///
    /// Fails without touching the engine if any account identifier is unset.
    pub fn new(
        config: BootstrapConfig,
        engine: Arc<dyn ProvisioningEngine>,
        publisher: Arc<dyn SourcePublisher>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            engine,
            publisher,
            state: BootstrapState::Init,
            key_arn: None,
            report: RunReport::new(),
        })
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn key_arn(&self) -> Option<&KeyArn> {
        self.key_arn.as_ref()
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Runs every remaining step until `Done` or the first failure
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting bootstrap run {} (tools={}, uat={}, prod={})",
            self.report.run_id,
            self.config.accounts.tools,
            self.config.accounts.uat,
            self.config.accounts.prod
        );

        while !self.state.is_terminal() {
            self.step().await?;
        }

        info!("Bootstrap run {} complete", self.report.run_id);
        Ok(())
    }

    /// Performs the single transition out of the current state
    pub async fn step(&mut self) -> Result<BootstrapState> {
        let from = self.state;
        let Some(to) = from.next() else {
            return Err(BootstrapError::InvalidTransition(from));
        };

        debug!("Transition {} -> {}", from, to);

        match self.perform(from).await {
            Ok(()) => {
                info!("{} -> {}", from, to);
                self.state = to;
                self.report.record(from, to, None);
                Ok(to)
            }
            Err(e) => {
                error!("{} -> {}: {}", from, BootstrapState::Failed, e);
                self.state = BootstrapState::Failed;
                self.report
                    .record(from, BootstrapState::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn perform(&mut self, from: BootstrapState) -> Result<()> {
        match from {
            BootstrapState::Init => {
                let roles = self.deploy_roles(None).await?;
                self.report.role_arns = roles.iter().map(RoleDescriptor::arn).collect();
                self.report
                    .deployed_stacks
                    .extend(roles.iter().map(RoleDescriptor::stack_name));
            }
            BootstrapState::RolesPhase1Deployed => {
                let stacks = self.deploy_channel_and_pipeline().await?;
                self.report.deployed_stacks.extend(stacks);
            }
            BootstrapState::ChannelAndPipelineDeployed => {
                let key = self.extract_key().await?;
                info!("Artifact key: {}", key);
                self.report.key_arn = Some(key.clone());
                self.key_arn = Some(key);
            }
            BootstrapState::KeyExtracted => {
                let key = self
                    .key_arn
                    .clone()
                    .ok_or_else(|| BootstrapError::MissingKeyArn {
                        stack: self.config.pipeline_stack.clone(),
                    })?;
                let roles = self.deploy_roles(Some(&key)).await?;
                self.report
                    .deployed_stacks
                    .extend(roles.iter().map(RoleDescriptor::stack_name));
            }
            BootstrapState::RolesPhase2Deployed => self.push_source().await?,
            BootstrapState::SourcePushed => {
                info!(
                    "Pipeline run triggered by push to {}",
                    self.config.source_endpoint()
                );
            }
            BootstrapState::Done | BootstrapState::Failed => {
                return Err(BootstrapError::InvalidTransition(from));
            }
        }

        Ok(())
    }

    /// Deploys the four role stacks concurrently and waits for all of them
    ///
    /// Missing role templates are rendered first. With no key the roles are
    /// created (or left as they are); with a key the same stacks are updated
    /// to grant decrypt on it. Returns the descriptors that were deployed.
    pub async fn deploy_roles(&self, key: Option<&KeyArn>) -> Result<Vec<RoleDescriptor>> {
        let phase = if key.is_some() {
            "roles with key"
        } else {
            "roles without key"
        };
        info!("Deploying {}", phase);

        write_role_templates(&self.config.template_dir, false).await?;

        let mut group = PhaseGroup::new(phase);
        let mut roles = Vec::new();

        for role in self.config.role_descriptors() {
            let role = match key {
                Some(key) => role.with_key(key.clone()),
                None => role,
            };

            let request = DeployRequest::new(self.config.role_target(&role))
                .with_parameters(role.parameters(&self.config.accounts.tools))
                .acknowledge_iam();

            let engine = Arc::clone(&self.engine);
            group.spawn(role.stack_name(), async move {
                engine.deploy(&request).await.map(|_| ())
            });
            roles.push(role);
        }

        first_failure(group.join().await)?;
        Ok(roles)
    }

    /// Deploys the repository (if absent) and the channel/pipeline stack
    ///
    /// The combined deploy log is written to the capture file. Returns the
    /// names of the stacks deployed.
    async fn deploy_channel_and_pipeline(&self) -> Result<Vec<String>> {
        let context = self.config.pipeline_definition().context();
        let mut deployed = Vec::new();
        let mut log = String::new();

        let repository = self.config.repository_target();
        let existing = self
            .engine
            .describe(&repository)
            .await
            .map_err(|e| deployment_error(&repository, e))?;

        match existing {
            Some(desc) => info!(
                "Repository stack {} already present ({})",
                desc.stack_name, desc.stack_status
            ),
            None => {
                let request = DeployRequest::new(repository.clone())
                    .with_parameters(context.clone())
                    .acknowledge_iam();
                let outcome = self
                    .engine
                    .deploy(&request)
                    .await
                    .map_err(|e| deployment_error(&repository, e))?;
                log.push_str(&outcome.log);
                deployed.push(outcome.stack);
            }
        }

        let pipeline = self.config.pipeline_target();
        let request = DeployRequest::new(pipeline.clone())
            .with_parameters(context)
            .acknowledge_iam();
        let outcome = self
            .engine
            .deploy(&request)
            .await
            .map_err(|e| deployment_error(&pipeline, e))?;
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&outcome.log);
        deployed.push(outcome.stack);

        self.write_capture(&log).await?;
        Ok(deployed)
    }

    async fn write_capture(&self, log: &str) -> Result<()> {
        let path = &self.config.capture_file;
        let capture_error = |source| BootstrapError::Capture {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(capture_error)?;
        }
        tokio::fs::write(path, log).await.map_err(capture_error)?;

        debug!("Deploy log captured to {}", path.display());
        Ok(())
    }

    /// Recovers the key ARN published by the channel stack
    async fn extract_key(&self) -> Result<KeyArn> {
        if self.config.key_lookup == KeyLookup::Structured {
            let pipeline = self.config.pipeline_target();
            match self.engine.describe(&pipeline).await {
                Ok(Some(desc)) => {
                    if let Some(key) =
                        find_output(&desc.outputs, KEY_ARN_OUTPUT).and_then(KeyArn::parse)
                    {
                        return Ok(key);
                    }
                    debug!("{} has no {} output", pipeline, KEY_ARN_OUTPUT);
                }
                Ok(None) => warn!("{} not found when reading outputs", pipeline),
                Err(e) => warn!("Failed to describe {}: {}", pipeline, e),
            }
            info!("Falling back to the captured deploy log");
        }

        let path = &self.config.capture_file;
        let log = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| BootstrapError::Capture {
                path: path.display().to_string(),
                source,
            })?;

        scrape_key_arn(&log).ok_or_else(|| BootstrapError::MissingKeyArn {
            stack: self.config.pipeline_stack.clone(),
        })
    }

    async fn push_source(&self) -> Result<()> {
        let request = self.config.push_request();
        self.publisher
            .publish(&request)
            .await
            .map_err(BootstrapError::SourcePush)
    }
}

fn deployment_error(target: &StackTarget, source: EngineError) -> BootstrapError {
    BootstrapError::Deployment {
        stack: target.name.clone(),
        source,
    }
}

/// Turns the first failed branch into the run's error
fn first_failure(outcomes: Vec<BranchOutcome<()>>) -> Result<()> {
    for outcome in outcomes {
        match outcome.result {
            Ok(()) => {}
            Err(BranchError::Engine(source)) => {
                return Err(BootstrapError::Deployment {
                    stack: outcome.label,
                    source,
                });
            }
            Err(BranchError::Task(message)) => {
                return Err(BootstrapError::TaskFailed {
                    label: outcome.label,
                    message,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeEngine, FakePublisher};
    use conveyor_core::account::Accounts;
    use conveyor_core::outputs::StackOutput;
    use conveyor_core::role::KEY_ARN_PARAM;
    use conveyor_core::stack::StackSource;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const KEY: &str = "arn:aws:kms:us-east-1:111:key/abc";

    fn pipeline_log(key: &str) -> String {
        format!(
            " ✅  PipelineStack\n\nOutputs:\nPipelineStack.KeyArn = {}\n\nStack ARN:\nx\n",
            key
        )
    }

    fn config(dir: &TempDir) -> BootstrapConfig {
        let mut cfg = BootstrapConfig::new(Accounts::new("111", "222", "333"));
        cfg.capture_file = dir.path().join("capture/pipeline-deploy.out");
        cfg.template_dir = dir.path().join("stacks");
        cfg.source_dir = dir.path().to_path_buf();
        cfg.key_lookup = KeyLookup::Text;
        cfg
    }

    fn bootstrapper(
        cfg: BootstrapConfig,
        engine: &Arc<FakeEngine>,
        publisher: &Arc<FakePublisher>,
    ) -> Bootstrapper {
        Bootstrapper::new(cfg, engine.clone(), publisher.clone()).unwrap()
    }

    fn sorted_role_stacks(deploys: &[(String, BTreeMap<String, String>)]) -> Vec<String> {
        let mut names: Vec<String> = deploys.iter().map(|(s, _)| s.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_end_to_end_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            Arc::new(FakeEngine::new().with_deploy_log("PipelineStack", &pipeline_log(KEY)));
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        boot.run().await.unwrap();

        assert_eq!(boot.state(), BootstrapState::Done);
        assert_eq!(boot.key_arn().map(KeyArn::as_str), Some(KEY));

        let deploys = engine.deploys();
        assert_eq!(deploys.len(), 10);

        // Phase 1: four role stacks, no key
        let phase1 = &deploys[..4];
        assert!(phase1.iter().all(|(_, p)| !p.contains_key(KEY_ARN_PARAM)));

        // Repository then pipeline in the tools account
        assert_eq!(deploys[4].0, "RepositoryStack");
        assert_eq!(deploys[5].0, "PipelineStack");
        assert_eq!(deploys[5].1["repositoryName"], "repo-111");

        // Phase 2: the same four stacks, now with the key
        let phase2 = &deploys[6..];
        assert!(
            phase2
                .iter()
                .all(|(_, p)| p.get(KEY_ARN_PARAM).map(String::as_str) == Some(KEY))
        );
        assert_eq!(sorted_role_stacks(phase1), sorted_role_stacks(phase2));

        let pushes = publisher.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].remote_url, "codecommit::us-east-1://tools@repo-111");
        assert_eq!(pushes[0].branch, "main");

        let report = boot.report();
        assert_eq!(report.final_state(), BootstrapState::Done);
        assert_eq!(report.transitions.len(), 6);
        assert_eq!(report.role_arns.len(), 4);
        assert!(
            report
                .role_arns
                .contains(&"arn:aws:iam::333:role/DeploymentRole".to_string())
        );
    }

    #[tokio::test]
    async fn test_capture_file_holds_deploy_log() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let capture = cfg.capture_file.clone();
        let engine =
            Arc::new(FakeEngine::new().with_deploy_log("PipelineStack", &pipeline_log(KEY)));
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(cfg, &engine, &publisher);
        boot.step().await.unwrap();
        boot.step().await.unwrap();

        let captured = std::fs::read_to_string(capture).unwrap();
        assert!(captured.contains("PipelineStack.KeyArn"));
        assert_eq!(boot.state(), BootstrapState::ChannelAndPipelineDeployed);
    }

    #[tokio::test]
    async fn test_missing_account_issues_no_engine_calls() {
        let engine = Arc::new(FakeEngine::new());
        let publisher = Arc::new(FakePublisher::new());

        let cfg = BootstrapConfig::new(Accounts::new("111", "", "333"));
        let err = Bootstrapper::new(cfg, engine.clone(), publisher.clone())
            .err()
            .unwrap();

        assert!(err.is_precondition());
        assert!(engine.calls().is_empty());
        assert!(publisher.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_halts_before_role_redeploy() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            FakeEngine::new()
                .with_deploy_log("PipelineStack", "Outputs:\nPipelineStack.Other = x\n\n"),
        );
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        let err = boot.run().await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::MissingKeyArn { ref stack } if stack == "PipelineStack"
        ));
        assert_eq!(boot.state(), BootstrapState::Failed);
        // four role deploys, repository, pipeline; no second role pass
        assert_eq!(engine.deploys().len(), 6);
        assert!(publisher.pushes().is_empty());
        assert_eq!(
            boot.report().transitions.last().unwrap().from,
            BootstrapState::ChannelAndPipelineDeployed
        );
    }

    #[tokio::test]
    async fn test_structured_lookup_preferred_over_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.key_lookup = KeyLookup::Structured;

        let engine = Arc::new(
            FakeEngine::new()
                .with_deploy_log("PipelineStack", &pipeline_log("arn:from-log"))
                .with_stack("PipelineStack", vec![StackOutput::new("KeyArn", KEY)]),
        );
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(cfg, &engine, &publisher);
        boot.run().await.unwrap();
        assert_eq!(boot.key_arn().map(KeyArn::as_str), Some(KEY));
    }

    #[tokio::test]
    async fn test_structured_lookup_falls_back_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.key_lookup = KeyLookup::Structured;

        let engine = Arc::new(
            FakeEngine::new()
                .with_deploy_log("PipelineStack", &pipeline_log(KEY))
                .with_stack("PipelineStack", vec![]),
        );
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(cfg, &engine, &publisher);
        boot.run().await.unwrap();
        assert_eq!(boot.key_arn().map(KeyArn::as_str), Some(KEY));
    }

    #[tokio::test]
    async fn test_role_failure_aborts_after_all_roles_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new().failing("prod-cross-account-role"));
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        let err = boot.run().await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Deployment { ref stack, .. } if stack == "prod-cross-account-role"
        ));
        assert_eq!(boot.state(), BootstrapState::Failed);
        assert_eq!(engine.deploys().len(), 4);
        assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::Describe { .. })));
    }

    #[tokio::test]
    async fn test_pipeline_failure_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new().failing("PipelineStack"));
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        let err = boot.run().await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Deployment { ref stack, .. } if stack == "PipelineStack"
        ));
        assert_eq!(boot.report().final_state(), BootstrapState::Failed);
        assert!(!dir.path().join("capture/pipeline-deploy.out").exists());
    }

    #[tokio::test]
    async fn test_push_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            Arc::new(FakeEngine::new().with_deploy_log("PipelineStack", &pipeline_log(KEY)));
        let publisher = Arc::new(FakePublisher::failing());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        let err = boot.run().await.unwrap_err();

        assert!(matches!(err, BootstrapError::SourcePush(_)));
        assert_eq!(boot.state(), BootstrapState::Failed);
    }

    #[tokio::test]
    async fn test_existing_repository_is_not_redeployed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            FakeEngine::new()
                .with_deploy_log("PipelineStack", &pipeline_log(KEY))
                .with_stack("RepositoryStack", vec![]),
        );
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        boot.run().await.unwrap();

        assert!(!engine.deploys().iter().any(|(s, _)| s == "RepositoryStack"));
    }

    #[tokio::test]
    async fn test_role_redeploy_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        let publisher = Arc::new(FakePublisher::new());
        let boot = bootstrapper(config(&dir), &engine, &publisher);

        let key = KeyArn::parse(KEY).unwrap();
        let first = boot.deploy_roles(Some(&key)).await.unwrap();
        let second = boot.deploy_roles(Some(&key)).await.unwrap();
        assert_eq!(first, second);

        let mut deploys = engine.deploys();
        let (a, b) = deploys.split_at_mut(4);
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_no_step_out_of_terminal_states() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            Arc::new(FakeEngine::new().with_deploy_log("PipelineStack", &pipeline_log(KEY)));
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        boot.run().await.unwrap();
        assert!(matches!(
            boot.step().await,
            Err(BootstrapError::InvalidTransition(BootstrapState::Done))
        ));

        let engine = Arc::new(FakeEngine::new().failing("uat-deployment-role"));
        let mut boot = bootstrapper(config(&dir), &engine, &publisher);
        assert!(boot.step().await.is_err());
        assert!(matches!(
            boot.step().await,
            Err(BootstrapError::InvalidTransition(BootstrapState::Failed))
        ));
        assert_eq!(engine.deploys().len(), 4);
    }

    #[tokio::test]
    async fn test_role_templates_rendered_before_first_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let stacks = cfg.template_dir.clone();
        assert!(!stacks.exists());

        let engine = Arc::new(FakeEngine::new());
        let publisher = Arc::new(FakePublisher::new());
        let mut boot = bootstrapper(cfg.clone(), &engine, &publisher);
        boot.step().await.unwrap();

        assert_eq!(engine.deploys().len(), 4);
        for role in cfg.role_descriptors() {
            let StackSource::Template(path) = cfg.role_target(&role).source else {
                panic!("role stacks deploy from templates");
            };
            assert!(path.starts_with(&stacks));
            assert!(path.exists(), "{} was not rendered", path.display());
        }
    }

    #[tokio::test]
    async fn test_unwritable_template_dir_fails_before_engine_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        // a regular file where the directory should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        cfg.template_dir = blocker;

        let engine = Arc::new(FakeEngine::new());
        let publisher = Arc::new(FakePublisher::new());
        let mut boot = bootstrapper(cfg, &engine, &publisher);
        let err = boot.step().await.unwrap_err();

        assert!(matches!(err, BootstrapError::Template { .. }));
        assert_eq!(boot.state(), BootstrapState::Failed);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_structured_lookup_missing_everywhere_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.key_lookup = KeyLookup::Structured;

        let engine = Arc::new(
            FakeEngine::new()
                .with_deploy_log("PipelineStack", "Outputs:\nPipelineStack.Other = x\n\n")
                .with_stack("PipelineStack", vec![StackOutput::new("Other", "x")]),
        );
        let publisher = Arc::new(FakePublisher::new());

        let mut boot = bootstrapper(cfg, &engine, &publisher);
        let err = boot.run().await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::MissingKeyArn { ref stack } if stack == "PipelineStack"
        ));
        assert_eq!(boot.state(), BootstrapState::Failed);
        assert!(boot.key_arn().is_none());

        let deploys = engine.deploys();
        assert_eq!(deploys.len(), 6);
        assert!(deploys.iter().all(|(_, p)| !p.contains_key(KEY_ARN_PARAM)));
        let described = EngineCall::Describe {
            stack: "PipelineStack".to_string(),
        };
        assert!(engine.calls().contains(&described));
        assert!(publisher.pushes().is_empty());
    }
}
