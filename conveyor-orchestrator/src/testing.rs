//! Recording fakes for the engine and publisher traits

use async_trait::async_trait;
use conveyor_core::outputs::StackOutput;
use conveyor_core::stack::{DeployOutcome, DeployRequest, StackDescription, StackTarget};
use conveyor_engine::{EngineError, ProvisioningEngine, PushRequest, SourcePublisher};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Deploy {
        stack: String,
        profile: String,
        parameters: BTreeMap<String, String>,
    },
    Describe {
        stack: String,
    },
    Delete {
        stack: String,
        profile: String,
    },
    EmptyBucket {
        profile: String,
        bucket: String,
    },
}

#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    logs: HashMap<String, String>,
    stacks: HashMap<String, StackDescription>,
    failing: HashSet<String>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text printed when `stack` deploys
    pub fn with_deploy_log(mut self, stack: &str, log: &str) -> Self {
        self.logs.insert(stack.to_string(), log.to_string());
        self
    }

    /// Makes `stack` describable with the given outputs
    pub fn with_stack(mut self, stack: &str, outputs: Vec<StackOutput>) -> Self {
        self.stacks.insert(
            stack.to_string(),
            StackDescription {
                stack_name: stack.to_string(),
                stack_status: "CREATE_COMPLETE".to_string(),
                outputs,
            },
        );
        self
    }

    /// Makes every operation on `stack` fail
    pub fn failing(mut self, stack: &str) -> Self {
        self.failing.insert(stack.to_string());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deploys(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Deploy {
                    stack, parameters, ..
                } => Some((stack, parameters)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Delete { stack, .. } => Some(stack),
                _ => None,
            })
            .collect()
    }

    fn fail(&self, stack: &str) -> conveyor_engine::Result<()> {
        if self.failing.contains(stack) {
            return Err(EngineError::CommandFailed {
                command: format!("fake {}", stack),
                exit_code: 255,
                stderr: format!("{} failed", stack),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProvisioningEngine for FakeEngine {
    async fn deploy(&self, request: &DeployRequest) -> conveyor_engine::Result<DeployOutcome> {
        let stack = request.target.name.clone();
        self.calls.lock().unwrap().push(EngineCall::Deploy {
            stack: stack.clone(),
            profile: request.target.profile.clone(),
            parameters: request.parameters.clone(),
        });
        self.fail(&stack)?;

        Ok(DeployOutcome {
            log: self.logs.get(&stack).cloned().unwrap_or_default(),
            stack,
        })
    }

    async fn describe(
        &self,
        target: &StackTarget,
    ) -> conveyor_engine::Result<Option<StackDescription>> {
        self.calls.lock().unwrap().push(EngineCall::Describe {
            stack: target.name.clone(),
        });
        Ok(self.stacks.get(&target.name).cloned())
    }

    async fn delete(&self, target: &StackTarget) -> conveyor_engine::Result<()> {
        self.calls.lock().unwrap().push(EngineCall::Delete {
            stack: target.name.clone(),
            profile: target.profile.clone(),
        });
        self.fail(&target.name)
    }

    async fn empty_bucket(&self, profile: &str, bucket: &str) -> conveyor_engine::Result<()> {
        self.calls.lock().unwrap().push(EngineCall::EmptyBucket {
            profile: profile.to_string(),
            bucket: bucket.to_string(),
        });
        self.fail(bucket)
    }
}

#[derive(Default)]
pub struct FakePublisher {
    pushes: Mutex<Vec<PushRequest>>,
    fail: bool,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            pushes: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourcePublisher for FakePublisher {
    async fn publish(&self, request: &PushRequest) -> conveyor_engine::Result<()> {
        self.pushes.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(EngineError::CommandFailed {
                command: "git push".to_string(),
                exit_code: 128,
                stderr: "remote rejected".to_string(),
            });
        }
        Ok(())
    }
}
