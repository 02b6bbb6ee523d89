//! Bootstrap states and run report

use chrono::{DateTime, Utc};
use conveyor_core::key::KeyArn;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bootstrap progress
///
/// `Failed` is absorbing: once entered, no further transition is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootstrapState {
    Init,
    /// Role stacks exist in both downstream accounts, without key access
    RolesPhase1Deployed,
    /// Repository, artifact channel and pipeline exist in the tools account
    ChannelAndPipelineDeployed,
    /// Key ARN recovered from the channel stack
    KeyExtracted,
    /// Role stacks updated with key access
    RolesPhase2Deployed,
    /// Source pushed; the pipeline's first run has been triggered
    SourcePushed,
    Done,
    Failed,
}

impl BootstrapState {
    /// The state a successful step leads to
    pub fn next(&self) -> Option<BootstrapState> {
        use BootstrapState::*;
        match self {
            Init => Some(RolesPhase1Deployed),
            RolesPhase1Deployed => Some(ChannelAndPipelineDeployed),
            ChannelAndPipelineDeployed => Some(KeyExtracted),
            KeyExtracted => Some(RolesPhase2Deployed),
            RolesPhase2Deployed => Some(SourcePushed),
            SourcePushed => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: BootstrapState,
    pub to: BootstrapState,
    pub at: DateTime<Utc>,
    /// Failure diagnostic when `to` is `Failed`
    pub error: Option<String>,
}

/// Everything a bootstrap run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<Transition>,
    /// ARNs of the four cross-account roles
    pub role_arns: Vec<String>,
    pub key_arn: Option<KeyArn>,
    /// Stacks deployed, in order, including repeats across phases
    pub deployed_stacks: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            transitions: Vec::new(),
            role_arns: Vec::new(),
            key_arn: None,
            deployed_stacks: Vec::new(),
        }
    }

    pub fn record(&mut self, from: BootstrapState, to: BootstrapState, error: Option<String>) {
        self.transitions.push(Transition {
            from,
            to,
            at: Utc::now(),
            error,
        });
    }

    /// Last state reached
    pub fn final_state(&self) -> BootstrapState {
        self.transitions
            .last()
            .map(|t| t.to)
            .unwrap_or(BootstrapState::Init)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_sequence() {
        let mut state = BootstrapState::Init;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }

        assert_eq!(
            seen,
            vec![
                BootstrapState::Init,
                BootstrapState::RolesPhase1Deployed,
                BootstrapState::ChannelAndPipelineDeployed,
                BootstrapState::KeyExtracted,
                BootstrapState::RolesPhase2Deployed,
                BootstrapState::SourcePushed,
                BootstrapState::Done,
            ]
        );
    }

    #[test]
    fn test_failed_is_absorbing() {
        assert!(BootstrapState::Failed.is_terminal());
        assert!(BootstrapState::Failed.next().is_none());
    }

    #[test]
    fn test_report_final_state() {
        let mut report = RunReport::new();
        assert_eq!(report.final_state(), BootstrapState::Init);

        report.record(BootstrapState::Init, BootstrapState::RolesPhase1Deployed, None);
        report.record(
            BootstrapState::RolesPhase1Deployed,
            BootstrapState::Failed,
            Some("boom".to_string()),
        );
        assert_eq!(report.final_state(), BootstrapState::Failed);
        assert_eq!(report.transitions[1].error.as_deref(), Some("boom"));
    }
}
