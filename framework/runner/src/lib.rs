mod cli;
mod config;
mod definition;
mod error;
mod executor;
mod init;
mod orchestrator;
mod output;
mod progress;
mod run;
mod shutdown;
mod types;
mod workload;

pub mod prelude {
    pub use crate::cli::{ReporterOpt, ServingBenchCli};
    pub use crate::config::{ServingBenchmarkConfig, DEFAULT_READY_TIMEOUT};
    pub use crate::definition::{BenchmarkDefinitionBuilder, RUN_SUMMARY_PATH_ENV};
    pub use crate::error::{Role, Severity, TrialError};
    pub use crate::init::init;
    pub use crate::orchestrator::{Orchestrator, TrialOutcome, TRIAL_WINDOW_OPERATION};
    pub use crate::output::{
        forward_lines, wait_for_pattern, AwaitOutputError, RunToCompletionError,
    };
    pub use crate::run::run;
    pub use crate::types::ServingBenchResult;
    pub use crate::workload::{
        CacheControl, Container, ContainerLease, Lease, LogVisualizer, Machine, Mount, MountKind,
        ResourceProvider, RunOptions, WorkloadRuntime,
    };

    /// Re-exported so that collaborators can be implemented with a single dependency on the runner.
    pub use async_trait::async_trait;
    pub use serving_bench_instruments::{ReportConfig, ReportMetric, Reporter};
    pub use serving_bench_summary_model::{
        ExtractError, MetricsRecord, ResultExtractor, RunSummary, SelectionPolicy, TrialRecord,
        TrialStatus,
    };
}
