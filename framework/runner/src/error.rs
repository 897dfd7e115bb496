use serving_bench_summary_model::{ExtractError, TrialStatus};

use crate::output::{AwaitOutputError, RunToCompletionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Role {
    #[display("server")]
    Server,
    #[display("client")]
    Client,
}

/// What a failed trial means for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The environment cannot support a measurement. The trial is skipped.
    Skip,
    /// The workload misbehaved. The trial is recorded as failed and the run continues.
    Trial,
    /// The environment is broken. No further trials are attempted.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum TrialError {
    #[error("environment precondition not met: {cause:#}")]
    EnvironmentPrecondition { cause: anyhow::Error },
    #[error("failed to acquire a {role} machine: {cause:#}")]
    Acquisition { role: Role, cause: anyhow::Error },
    #[error("failed to start the {role}: {cause:#}")]
    Startup { role: Role, cause: anyhow::Error },
    #[error("server did not become ready: {0}")]
    Readiness(#[source] AwaitOutputError),
    #[error("client workload failed: {0}")]
    WorkloadExecution(#[source] RunToCompletionError),
    #[error("failed to extract metrics: {0}")]
    Extraction(#[from] ExtractError),
}

impl TrialError {
    pub fn severity(&self) -> Severity {
        match self {
            TrialError::EnvironmentPrecondition { .. } => Severity::Skip,
            TrialError::Acquisition { .. }
            | TrialError::Startup { .. }
            | TrialError::Readiness(_) => Severity::Fatal,
            TrialError::WorkloadExecution(_) | TrialError::Extraction(_) => Severity::Trial,
        }
    }

    /// Captured process output that helps to diagnose the failure.
    pub fn output(&self) -> Option<&str> {
        match self {
            TrialError::Readiness(e) => e.output(),
            TrialError::WorkloadExecution(e) => e.output(),
            _ => None,
        }
    }

    pub(crate) fn status(&self) -> TrialStatus {
        match self.severity() {
            Severity::Skip => TrialStatus::Skipped,
            Severity::Trial => TrialStatus::Failed,
            Severity::Fatal => TrialStatus::Fatal,
        }
    }
}
