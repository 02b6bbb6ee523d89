//! Stack targets and deploy requests
//!
//! A stack is the unit the provisioning engine creates, updates and deletes.
//! These types describe *which* stack and *how* it is defined; the engine
//! decides how to reconcile it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::outputs::StackOutput;

/// How a stack's resource graph is defined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackSource {
    /// A template file deployed directly
    Template(PathBuf),
    /// A stack synthesized by a CDK app rooted at `app_dir`
    Cdk { app_dir: PathBuf },
    /// A stack created by something else (e.g. the pipeline); delete-only
    External,
}

/// A named stack in a specific account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTarget {
    pub name: String,
    /// Credentials profile for the account that owns the stack
    pub profile: String,
    pub region: Option<String>,
    pub source: StackSource,
}

impl StackTarget {
    pub fn new(name: impl Into<String>, profile: impl Into<String>, source: StackSource) -> Self {
        Self {
            name: name.into(),
            profile: profile.into(),
            region: None,
            source,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl fmt::Display for StackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.profile)
    }
}

/// Capabilities that must be acknowledged for a deploy to proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// The stack creates or changes named IAM resources
    NamedIam,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
        }
    }
}

/// Create-or-update request for a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub target: StackTarget,
    pub parameters: BTreeMap<String, String>,
    pub capabilities: Vec<Capability>,
}

impl DeployRequest {
    pub fn new(target: StackTarget) -> Self {
        Self {
            target,
            parameters: BTreeMap::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Acknowledges that the stack alters IAM resources
    pub fn acknowledge_iam(mut self) -> Self {
        if !self.capabilities.contains(&Capability::NamedIam) {
            self.capabilities.push(Capability::NamedIam);
        }
        self
    }
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub stack: String,
    /// Everything the engine printed, including any outputs section
    pub log: String,
}

/// Live state of a stack as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub stack_name: String,
    pub stack_status: String,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl StackDescription {
    /// Whether the stack is in a settled, usable state
    pub fn is_complete(&self) -> bool {
        self.stack_status.ends_with("_COMPLETE") && !self.stack_status.contains("ROLLBACK")
    }
}
