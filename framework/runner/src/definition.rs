use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::cli::{ReporterOpt, ServingBenchCli};
use crate::config::ServingBenchmarkConfig;
use crate::workload::{CacheControl, LogVisualizer, ResourceProvider, WorkloadRuntime};

/// Environment variable to set a path that the run summary is appended to.
pub const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";

/// The builder for a benchmark definition.
///
/// This must be used at the start of a benchmark to define what is run and which collaborators
/// provide machines and containers.
pub struct BenchmarkDefinitionBuilder {
    /// The name of the benchmark, which should be unique within the suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// Command line configuration, usually from [crate::init::init].
    cli: ServingBenchCli,
    /// The server/client pair to benchmark.
    config: ServingBenchmarkConfig,
    /// Supplies machines for the server.
    server_provider: Option<Arc<dyn ResourceProvider>>,
    /// Supplies machines for the client. When not set, the client runs on the machine that
    /// hosts the server for that trial.
    client_provider: Option<Arc<dyn ResourceProvider>>,
    runtime: Option<Arc<dyn WorkloadRuntime>>,
    cache_control: Option<Arc<dyn CacheControl>>,
    /// Optional, receives the server container after every trial.
    visualizer: Option<Arc<dyn LogVisualizer>>,
    /// Where to append the run summary. Falls back to [RUN_SUMMARY_PATH_ENV].
    summary_path: Option<PathBuf>,
    /// Values recorded in the run summary and its fingerprint.
    env: Vec<(String, String)>,
}

pub(crate) struct BenchmarkDefinition {
    pub name: String,
    pub run_id: String,
    pub trials: usize,
    pub no_progress: bool,
    pub reporter: ReporterOpt,
    pub metrics_dir: PathBuf,
    pub config: ServingBenchmarkConfig,
    pub server_provider: Arc<dyn ResourceProvider>,
    pub client_provider: Option<Arc<dyn ResourceProvider>>,
    pub runtime: Arc<dyn WorkloadRuntime>,
    pub cache_control: Arc<dyn CacheControl>,
    pub visualizer: Option<Arc<dyn LogVisualizer>>,
    pub summary_path: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl BenchmarkDefinitionBuilder {
    pub fn new(name: &str, cli: ServingBenchCli, config: ServingBenchmarkConfig) -> Self {
        Self {
            name: name.to_string(),
            cli,
            config,
            server_provider: None,
            client_provider: None,
            runtime: None,
            cache_control: None,
            visualizer: None,
            summary_path: None,
            env: Vec::new(),
        }
    }

    pub fn cli(&self) -> &ServingBenchCli {
        &self.cli
    }

    /// Set the provider for server machines, see [BenchmarkDefinitionBuilder::server_provider].
    pub fn use_server_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.server_provider = Some(provider);
        self
    }

    /// Set the provider for client machines, see [BenchmarkDefinitionBuilder::client_provider].
    pub fn use_client_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.client_provider = Some(provider);
        self
    }

    pub fn use_runtime(mut self, runtime: Arc<dyn WorkloadRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn use_cache_control(mut self, cache_control: Arc<dyn CacheControl>) -> Self {
        self.cache_control = Some(cache_control);
        self
    }

    pub fn use_visualizer(mut self, visualizer: Arc<dyn LogVisualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = Some(path.into());
        self
    }

    /// Record a setting that affects the results in the run summary.
    pub fn add_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<BenchmarkDefinition> {
        if self.cli.trials == 0 {
            bail!("At least one trial must be requested");
        }

        let server_provider = self
            .server_provider
            .context("No server provider configured, call `use_server_provider`")?;
        let runtime = self
            .runtime
            .context("No workload runtime configured, call `use_runtime`")?;
        let cache_control = self
            .cache_control
            .context("No cache control configured, call `use_cache_control`")?;

        let mut config = self.config;
        if let Some(ready_timeout) = self.cli.ready_timeout {
            config.ready_timeout = Duration::from_secs(ready_timeout);
        }
        if let Some(client_timeout) = self.cli.client_timeout {
            config.client_timeout = Some(Duration::from_secs(client_timeout));
        }

        let summary_path = self
            .summary_path
            .or_else(|| std::env::var(RUN_SUMMARY_PATH_ENV).ok().map(PathBuf::from));

        let mut env = self.env;
        env.push((
            "ready_timeout_s".to_string(),
            config.ready_timeout.as_secs().to_string(),
        ));
        if let Some(client_timeout) = config.client_timeout {
            env.push((
                "client_timeout_s".to_string(),
                client_timeout.as_secs().to_string(),
            ));
        }

        Ok(BenchmarkDefinition {
            name: self.name,
            run_id: self.cli.run_id.unwrap_or_else(|| nanoid::nanoid!()),
            trials: self.cli.trials,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            metrics_dir: self.cli.metrics_dir,
            config,
            server_provider,
            client_provider: self.client_provider,
            runtime,
            cache_control,
            visualizer: self.visualizer,
            summary_path,
            env,
        })
    }
}
