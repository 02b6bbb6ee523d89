//! Conveyor Core
//!
//! Core types for the Conveyor cross-account delivery bootstrapper.
//!
//! This crate contains:
//! - Accounts and stages: the three accounts a run touches
//! - Role descriptors: cross-account roles and their predictable ARNs
//! - Stacks: targets and deploy requests handed to the provisioning engine
//! - Outputs: recovery of named outputs from deployment results
//! - Pipeline: the release pipeline layout and the roles each stage assumes
//! - Template: the role stack template deployed into downstream accounts

pub mod account;
pub mod key;
pub mod outputs;
pub mod pipeline;
pub mod role;
pub mod stack;
pub mod template;
