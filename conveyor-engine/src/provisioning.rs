//! Provisioning engine abstraction

use async_trait::async_trait;
use conveyor_core::stack::{DeployOutcome, DeployRequest, StackDescription, StackTarget};

use crate::error::Result;

/// The external engine that reconciles stacks against live infrastructure
///
/// Implementations must deploy with create-or-update semantics: deploying an
/// unchanged stack again is a successful no-op, never a duplicate-creation
/// error.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Creates or updates a stack and waits for the engine to settle
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome>;

    /// Describes a stack, or `None` if it does not exist
    async fn describe(&self, target: &StackTarget) -> Result<Option<StackDescription>>;

    /// Requests deletion of a stack
    async fn delete(&self, target: &StackTarget) -> Result<()>;

    /// Removes every object from a bucket so it can be deleted
    async fn empty_bucket(&self, profile: &str, bucket: &str) -> Result<()>;
}
