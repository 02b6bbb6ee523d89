//! Cross-account role descriptors
//!
//! Every downstream account carries two roles. Their ARNs depend only on the
//! account and the role kind, so the pipeline can reference them before the
//! roles have been granted access to the artifact key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::account::{AccountId, Accounts, Stage};
use crate::key::KeyArn;

/// Parameter carrying the tools account to the role stacks
pub const TOOLS_ACCOUNT_PARAM: &str = "ToolsAccountId";
/// Parameter carrying the stage name to the role stacks
pub const STAGE_PARAM: &str = "Stage";
/// Parameter carrying the artifact key to the role stacks
pub const KEY_ARN_PARAM: &str = "KeyArn";

/// Kind of cross-account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    /// Assumed by the provisioning engine to create and update resources
    DeploymentRole,
    /// Assumed by the pipeline to move artifacts and start deployments
    CrossAccountRole,
}

impl RoleKind {
    pub const ALL: [RoleKind; 2] = [RoleKind::DeploymentRole, RoleKind::CrossAccountRole];

    /// IAM role name
    pub fn role_name(&self) -> &'static str {
        match self {
            RoleKind::DeploymentRole => "DeploymentRole",
            RoleKind::CrossAccountRole => "CrossAccountRole",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            RoleKind::DeploymentRole => "deployment-role",
            RoleKind::CrossAccountRole => "cross-account-role",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.role_name())
    }
}

/// A role deployed into a downstream account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub account: AccountId,
    pub stage: Stage,
    pub kind: RoleKind,
    /// Artifact key the role may decrypt with; unset until the channel exists
    pub key_arn: Option<KeyArn>,
}

impl RoleDescriptor {
    pub fn new(account: AccountId, stage: Stage, kind: RoleKind) -> Self {
        Self {
            account,
            stage,
            kind,
            key_arn: None,
        }
    }

    pub fn with_key(mut self, key_arn: KeyArn) -> Self {
        self.key_arn = Some(key_arn);
        self
    }

    /// Fully qualified role ARN
    pub fn arn(&self) -> String {
        role_arn(&self.account, self.kind)
    }

    /// Name of the stack that owns this role
    ///
    /// Stable across the key-less and keyed deploys so the second deploy
    /// updates the first.
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.stage.slug(), self.kind.slug())
    }

    /// Parameters for the role stack deploy
    pub fn parameters(&self, tools: &AccountId) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(TOOLS_ACCOUNT_PARAM.to_string(), tools.to_string());
        params.insert(STAGE_PARAM.to_string(), self.stage.name().to_string());
        if let Some(key) = &self.key_arn {
            params.insert(KEY_ARN_PARAM.to_string(), key.to_string());
        }
        params
    }

    /// All four descriptors for a set of accounts, without a key
    pub fn all_for(accounts: &Accounts) -> Vec<RoleDescriptor> {
        Stage::ALL
            .iter()
            .flat_map(|stage| {
                RoleKind::ALL.iter().map(move |kind| {
                    RoleDescriptor::new(accounts.downstream(*stage).clone(), *stage, *kind)
                })
            })
            .collect()
    }
}

/// ARN of a role kind in an account
pub fn role_arn(account: &AccountId, kind: RoleKind) -> String {
    format!("arn:aws:iam::{}:role/{}", account, kind.role_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Accounts {
        Accounts::new("111", "222", "333")
    }

    #[test]
    fn test_all_for_yields_four_descriptors() {
        let roles = RoleDescriptor::all_for(&accounts());
        assert_eq!(roles.len(), 4);
        assert!(roles.iter().all(|r| r.key_arn.is_none()));

        let names: Vec<String> = roles.iter().map(|r| r.stack_name()).collect();
        assert_eq!(
            names,
            vec![
                "uat-deployment-role",
                "uat-cross-account-role",
                "prod-deployment-role",
                "prod-cross-account-role"
            ]
        );
    }

    #[test]
    fn test_arn_is_independent_of_key() {
        let role = RoleDescriptor::new("222".into(), Stage::Uat, RoleKind::CrossAccountRole);
        let before = (role.arn(), role.stack_name());

        let keyed = role.with_key(KeyArn::parse("arn:aws:kms:us-east-1:111:key/abc").unwrap());
        assert_eq!(before, (keyed.arn(), keyed.stack_name()));
        assert_eq!(before.0, "arn:aws:iam::222:role/CrossAccountRole");
    }

    #[test]
    fn test_parameters_include_key_only_when_set() {
        let tools = AccountId::new("111");
        let role = RoleDescriptor::new("333".into(), Stage::Prod, RoleKind::DeploymentRole);

        let params = role.parameters(&tools);
        assert_eq!(params.get(TOOLS_ACCOUNT_PARAM).map(String::as_str), Some("111"));
        assert_eq!(params.get(STAGE_PARAM).map(String::as_str), Some("Prod"));
        assert!(!params.contains_key(KEY_ARN_PARAM));

        let params = role
            .with_key(KeyArn::parse("arn:aws:kms:us-east-1:111:key/abc").unwrap())
            .parameters(&tools);
        assert_eq!(
            params.get(KEY_ARN_PARAM).map(String::as_str),
            Some("arn:aws:kms:us-east-1:111:key/abc")
        );
    }
}
