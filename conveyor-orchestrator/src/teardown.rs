//! Teardown orchestrator
//!
//! Best-effort removal of everything bootstrap created, in reverse order:
//!
//! 1. Delete both application stacks (concurrently)
//! 2. Empty the artifact bucket so it can be deleted
//! 3. Destroy the channel/pipeline stack
//! 4. Delete the four role stacks (concurrently)
//! 5. Destroy the repository stack
//!
//! A failed branch is logged and reported but never stops its siblings or
//! later steps. Residual resources are left for the operator.

use conveyor_core::account::Stage;
use conveyor_core::outputs::{ARTIFACT_BUCKET_OUTPUT, find_output};
use conveyor_core::stack::StackTarget;
use conveyor_engine::ProvisioningEngine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::barrier::{BranchOutcome, PhaseGroup};
use crate::config::BootstrapConfig;
use crate::error::Result;

/// Outcome of one teardown branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownStep {
    pub label: String,
    /// `None` on success, the diagnostic otherwise
    pub error: Option<String>,
}

/// Per-branch outcomes of a teardown run, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
}

impl TeardownReport {
    pub fn failures(&self) -> Vec<&TeardownStep> {
        self.steps.iter().filter(|s| s.error.is_some()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }

    fn push_ok(&mut self, label: impl Into<String>) {
        self.steps.push(TeardownStep {
            label: label.into(),
            error: None,
        });
    }

    fn push_err(&mut self, label: impl Into<String>, error: impl ToString) {
        self.steps.push(TeardownStep {
            label: label.into(),
            error: Some(error.to_string()),
        });
    }

    fn extend_outcomes(&mut self, outcomes: Vec<BranchOutcome<()>>) {
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => self.push_ok(outcome.label),
                Err(e) => self.push_err(outcome.label, e),
            }
        }
    }
}

/// Best-effort teardown of a bootstrap
pub struct Teardown {
    config: Arc<BootstrapConfig>,
    engine: Arc<dyn ProvisioningEngine>,
}

impl Teardown {
    /// Creates a teardown after validating the configuration
    pub fn new(config: BootstrapConfig, engine: Arc<dyn ProvisioningEngine>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            engine,
        })
    }

    /// Runs every step and reports each branch's outcome
    pub async fn run(&self) -> TeardownReport {
        let mut report = TeardownReport::default();

        info!("Deleting application stacks");
        let targets: Vec<StackTarget> = Stage::ALL
            .iter()
            .map(|stage| self.config.application_target(*stage))
            .collect();
        report.extend_outcomes(self.delete_all("application stacks", targets).await);

        info!("Emptying artifact bucket");
        self.empty_artifact_bucket(&mut report).await;

        info!("Destroying pipeline stack");
        let pipeline = self.config.pipeline_target();
        self.delete_one(&pipeline, &mut report).await;

        info!("Deleting role stacks");
        let targets: Vec<StackTarget> = self
            .config
            .role_descriptors()
            .iter()
            .map(|role| self.config.role_target(role))
            .collect();
        report.extend_outcomes(self.delete_all("role stacks", targets).await);

        info!("Destroying repository stack");
        let repository = self.config.repository_target();
        self.delete_one(&repository, &mut report).await;

        let failures = report.failures().len();
        if failures == 0 {
            info!("Teardown complete");
        } else {
            warn!("Teardown finished with {} failed step(s)", failures);
        }

        report
    }

    async fn delete_all(&self, phase: &str, targets: Vec<StackTarget>) -> Vec<BranchOutcome<()>> {
        let mut group = PhaseGroup::new(phase);
        for target in targets {
            let engine = Arc::clone(&self.engine);
            group.spawn(format!("delete {}", target), async move {
                engine.delete(&target).await
            });
        }
        group.join().await
    }

    async fn delete_one(&self, target: &StackTarget, report: &mut TeardownReport) {
        let label = format!("delete {}", target);
        match self.engine.delete(target).await {
            Ok(()) => report.push_ok(label),
            Err(e) => {
                warn!("{} failed: {}", label, e);
                report.push_err(label, e);
            }
        }
    }

    async fn empty_artifact_bucket(&self, report: &mut TeardownReport) {
        let Some(bucket) = self.artifact_bucket().await else {
            warn!("Artifact bucket unknown; skipping");
            report.push_err(
                "empty artifact bucket",
                format!(
                    "no bucket configured and {} publishes no {} output",
                    self.config.pipeline_stack, ARTIFACT_BUCKET_OUTPUT
                ),
            );
            return;
        };

        let label = format!("empty s3://{}", bucket);
        match self
            .engine
            .empty_bucket(&self.config.profiles.tools, &bucket)
            .await
        {
            Ok(()) => report.push_ok(label),
            Err(e) => {
                warn!("{} failed: {}", label, e);
                report.push_err(label, e);
            }
        }
    }

    /// Configured bucket, else the pipeline stack's `ArtifactBucket` output
    async fn artifact_bucket(&self) -> Option<String> {
        if let Some(bucket) = &self.config.artifact_bucket {
            return Some(bucket.clone());
        }

        match self.engine.describe(&self.config.pipeline_target()).await {
            Ok(Some(desc)) => find_output(&desc.outputs, ARTIFACT_BUCKET_OUTPUT).map(String::from),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to describe {}: {}", self.config.pipeline_stack, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeEngine};
    use conveyor_core::account::Accounts;
    use conveyor_core::outputs::StackOutput;

    fn config() -> BootstrapConfig {
        BootstrapConfig::new(Accounts::new("111", "222", "333"))
    }

    fn position(calls: &[EngineCall], pred: impl Fn(&EngineCall) -> bool) -> usize {
        calls.iter().position(pred).unwrap()
    }

    #[tokio::test]
    async fn test_full_teardown_order() {
        let engine = Arc::new(FakeEngine::new().with_stack(
            "PipelineStack",
            vec![StackOutput::new("ArtifactBucket", "artifacts-111")],
        ));
        let teardown = Teardown::new(config(), engine.clone()).unwrap();

        let report = teardown.run().await;
        assert!(report.is_clean());
        assert_eq!(report.steps.len(), 9);

        let calls = engine.calls();
        let app = position(&calls, |c| {
            matches!(c, EngineCall::Delete { stack, .. } if stack.ends_with("hello-api"))
        });
        let empty = position(&calls, |c| matches!(c, EngineCall::EmptyBucket { .. }));
        let pipeline = position(&calls, |c| {
            matches!(c, EngineCall::Delete { stack, .. } if stack == "PipelineStack")
        });
        let role = position(&calls, |c| {
            matches!(c, EngineCall::Delete { stack, .. } if stack.ends_with("-role"))
        });
        let repo = position(&calls, |c| {
            matches!(c, EngineCall::Delete { stack, .. } if stack == "RepositoryStack")
        });
        assert!(app < empty && empty < pipeline && pipeline < role && role < repo);

        assert!(calls.contains(&EngineCall::EmptyBucket {
            profile: "tools".to_string(),
            bucket: "artifacts-111".to_string()
        }));
    }

    #[tokio::test]
    async fn test_application_deletes_independent() {
        let engine = Arc::new(
            FakeEngine::new()
                .failing("uat-hello-api")
                .with_stack("PipelineStack", vec![]),
        );
        let mut cfg = config();
        cfg.artifact_bucket = Some("artifacts-111".to_string());
        let teardown = Teardown::new(cfg, engine.clone()).unwrap();

        let report = teardown.run().await;

        let deletes = engine.deletes();
        assert!(deletes.contains(&"uat-hello-api".to_string()));
        assert!(deletes.contains(&"prod-hello-api".to_string()));
        // later steps still ran
        assert!(deletes.contains(&"RepositoryStack".to_string()));
        assert_eq!(deletes.len(), 8);

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].label.contains("uat-hello-api"));
    }

    #[tokio::test]
    async fn test_unknown_bucket_is_reported_not_fatal() {
        let engine = Arc::new(FakeEngine::new());
        let teardown = Teardown::new(config(), engine.clone()).unwrap();

        let report = teardown.run().await;

        assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::EmptyBucket { .. })));
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].label, "empty artifact bucket");
        assert!(engine.deletes().contains(&"PipelineStack".to_string()));
    }

    #[tokio::test]
    async fn test_teardown_requires_accounts() {
        let engine = Arc::new(FakeEngine::new());
        let cfg = BootstrapConfig::new(Accounts::new("", "222", "333"));
        assert!(Teardown::new(cfg, engine.clone()).is_err());
        assert!(engine.calls().is_empty());
    }
}
