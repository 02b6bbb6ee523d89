//! Account identifiers and deployment stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque cloud account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account identifier, trimming surrounding whitespace
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        AccountId::new(s)
    }
}

/// Downstream stage the pipeline promotes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Uat,
    Prod,
}

impl Stage {
    /// Promotion order
    pub const ALL: [Stage; 2] = [Stage::Uat, Stage::Prod];

    /// Value passed to stacks as the `Stage` parameter
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Uat => "Uat",
            Stage::Prod => "Prod",
        }
    }

    /// Lowercase form used in stack names
    pub fn slug(&self) -> &'static str {
        match self {
            Stage::Uat => "uat",
            Stage::Prod => "prod",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The three accounts involved in a run
///
/// The tools account hosts the repository, artifact channel and pipeline.
/// UAT and Prod receive the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    pub tools: AccountId,
    pub uat: AccountId,
    pub prod: AccountId,
}

impl Accounts {
    pub fn new(
        tools: impl Into<AccountId>,
        uat: impl Into<AccountId>,
        prod: impl Into<AccountId>,
    ) -> Self {
        Self {
            tools: tools.into(),
            uat: uat.into(),
            prod: prod.into(),
        }
    }

    /// Account a downstream stage deploys into
    pub fn downstream(&self, stage: Stage) -> &AccountId {
        match stage {
            Stage::Uat => &self.uat,
            Stage::Prod => &self.prod,
        }
    }

    /// Names of the identifiers that are not set
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("tools", &self.tools),
            ("uat", &self.uat),
            ("prod", &self.prod),
        ]
        .into_iter()
        .filter(|(_, id)| id.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}
