//! Conveyor Orchestrator
//!
//! Sequences the bootstrap and teardown of a cross-account delivery pipeline.
//!
//! Architecture:
//! - Configuration: accounts, profiles and stack names, validated once
//! - State: bootstrap states and the run report
//! - Barrier: concurrent fan-out of independent deployments within a phase
//! - Bootstrap: the two-pass role / key handoff state machine
//! - Teardown: best-effort reverse removal
//! - Templates: role stack templates rendered into the template directory

pub mod barrier;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod state;
pub mod teardown;
pub mod templates;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::Bootstrapper;
pub use config::{BootstrapConfig, KeyLookup, Profiles};
pub use error::{BootstrapError, ConfigError, Result};
pub use state::{BootstrapState, RunReport, Transition};
pub use teardown::{Teardown, TeardownReport, TeardownStep};
pub use templates::write_role_templates;
