//! Conveyor Engine
//!
//! Adapters for the external systems the bootstrap drives: the provisioning
//! engine that reconciles stacks, and git for publishing source.
//!
//! Both are trait-based so the orchestrator can be exercised against fakes.
//! The shipped implementations run the `aws`, `cdk` and `git` CLIs.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_core::stack::{DeployRequest, StackSource, StackTarget};
//! use conveyor_engine::{CliEngine, ProvisioningEngine};
//!
//! #[tokio::main]
//! async fn main() -> conveyor_engine::Result<()> {
//!     let engine = CliEngine::new();
//!     let target = StackTarget::new(
//!         "uat-deployment-role",
//!         "uat",
//!         StackSource::Template("stacks/deployment-role.json".into()),
//!     );
//!
//!     let outcome = engine
//!         .deploy(&DeployRequest::new(target).acknowledge_iam())
//!         .await?;
//!     println!("{}", outcome.log);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod command;
pub mod error;
pub mod provisioning;
pub mod source;

pub use cli::CliEngine;
pub use error::{EngineError, Result};
pub use provisioning::ProvisioningEngine;
pub use source::{GitPublisher, PushRequest, SourcePublisher};
