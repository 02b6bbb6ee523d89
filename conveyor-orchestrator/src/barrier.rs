//! Phase fan-out and join
//!
//! Independent operations within a phase run as separate tasks. The phase is
//! over only when every task has finished; nothing is cancelled early, even
//! after a failure.

use conveyor_engine::EngineError;
use std::future::Future;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Why a branch did not succeed
#[derive(Debug, Error)]
pub enum BranchError {
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// The task panicked or was aborted
    #[error("task did not complete: {0}")]
    Task(String),
}

/// Outcome of one branch of a phase
#[derive(Debug)]
pub struct BranchOutcome<T> {
    pub label: String,
    pub result: Result<T, BranchError>,
}

/// A set of concurrently running operations joined as one phase
pub struct PhaseGroup<T> {
    name: String,
    tasks: Vec<(String, JoinHandle<conveyor_engine::Result<T>>)>,
}

impl<T: Send + 'static> PhaseGroup<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Dispatches an operation immediately
    pub fn spawn<F>(&mut self, label: impl Into<String>, operation: F)
    where
        F: Future<Output = conveyor_engine::Result<T>> + Send + 'static,
    {
        let label = label.into();
        debug!("{}: dispatching {}", self.name, label);
        self.tasks.push((label, tokio::spawn(operation)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every branch, in dispatch order
    pub async fn join(self) -> Vec<BranchOutcome<T>> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());

        for (label, handle) in self.tasks {
            let result = match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    warn!("{}: {} failed: {}", self.name, label, e);
                    Err(BranchError::Engine(e))
                }
                Err(e) => {
                    warn!("{}: {} task failed: {}", self.name, label, e);
                    Err(BranchError::Task(e.to_string()))
                }
            };
            outcomes.push(BranchOutcome { label, result });
        }

        outcomes
    }
}
