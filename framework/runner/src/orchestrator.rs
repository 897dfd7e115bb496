use std::sync::Arc;
use std::time::Duration;

use serving_bench_instruments::{OperationRecord, ReportMetric, Reporter};
use serving_bench_summary_model::{MetricsRecord, ResultExtractor, SelectionPolicy};

use crate::config::ServingBenchmarkConfig;
use crate::error::{Role, TrialError};
use crate::output::RunToCompletionError;
use crate::workload::{
    CacheControl, Container, ContainerLease, Lease, LogVisualizer, Machine, ResourceProvider,
    WorkloadRuntime,
};

/// Operation id of the timed client phase.
pub const TRIAL_WINDOW_OPERATION: &str = "trial_window";

/// The result of a measured trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub metrics: MetricsRecord,
    /// Wall-clock time the client workload took, including container start up.
    pub window: Duration,
}

/// Runs one server/client trial at a time and publishes its metrics.
pub struct Orchestrator {
    config: ServingBenchmarkConfig,
    runtime: Arc<dyn WorkloadRuntime>,
    cache_control: Arc<dyn CacheControl>,
    visualizer: Option<Arc<dyn LogVisualizer>>,
    reporter: Arc<Reporter>,
    extractor: ResultExtractor,
}

impl Orchestrator {
    pub fn new(
        config: ServingBenchmarkConfig,
        runtime: Arc<dyn WorkloadRuntime>,
        cache_control: Arc<dyn CacheControl>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            config,
            runtime,
            cache_control,
            visualizer: None,
            reporter,
            // Every trial starts from an empty directory, so more than one file means the client
            // did something unexpected.
            extractor: ResultExtractor::default().with_policy(SelectionPolicy::ExactlyOne),
        }
    }

    pub fn with_visualizer(mut self, visualizer: Arc<dyn LogVisualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn with_extractor(mut self, extractor: ResultExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &ServingBenchmarkConfig {
        &self.config
    }

    /// Run a single trial.
    ///
    /// The client runs on a machine from `client_provider`, or on the server's machine when no
    /// client provider is given.
    ///
    /// Machines and containers are released and the results directory is removed before this
    /// returns, whichever way the trial ends. The same holds if the future is dropped part way.
    pub async fn run_trial(
        &self,
        index: usize,
        server_provider: &dyn ResourceProvider,
        client_provider: Option<&dyn ResourceProvider>,
    ) -> Result<TrialOutcome, TrialError> {
        let server_machine = Lease::acquire(server_provider)
            .await
            .map_err(|cause| TrialError::Acquisition {
                role: Role::Server,
                cause,
            })?;

        self.cache_control
            .drop_caches(&server_machine)
            .await
            .map_err(|cause| TrialError::EnvironmentPrecondition { cause })?;

        let server =
            ContainerLease::start(self.runtime.as_ref(), &server_machine, &self.config.server)
                .await
                .map_err(|cause| TrialError::Startup {
                    role: Role::Server,
                    cause,
                })?;

        let result = self.measure(index, &server, client_provider).await;

        self.visualize(&server).await;

        result
    }

    async fn measure(
        &self,
        index: usize,
        server: &Container,
        client_provider: Option<&dyn ResourceProvider>,
    ) -> Result<TrialOutcome, TrialError> {
        log::info!(
            "Waiting up to {:?} for {} to be ready",
            self.config.ready_timeout,
            server.name
        );
        self.runtime
            .await_output_pattern(server, &self.config.ready_pattern, self.config.ready_timeout)
            .await
            .map_err(TrialError::Readiness)?;
        log::info!("Server {} is ready", server.name);

        let client_lease = match client_provider {
            Some(provider) => Some(Lease::acquire(provider).await.map_err(|cause| {
                TrialError::Acquisition {
                    role: Role::Client,
                    cause,
                }
            })?),
            None => None,
        };
        let client_machine: &Machine = client_lease.as_deref().unwrap_or(&server.machine);
        log::debug!("Running the client on {}", client_machine.id);

        let results_dir = tempfile::Builder::new()
            .prefix("serving-bench-results-")
            .tempdir()
            .map_err(|e| TrialError::Startup {
                role: Role::Client,
                cause: anyhow::Error::new(e).context("Failed to create results directory"),
            })?;

        let client_options = self.config.client_run_options(
            self.runtime.make_link(server, &self.config.server_alias),
            results_dir.path(),
        );

        let mut window = OperationRecord::new(TRIAL_WINDOW_OPERATION).with_attr("trial", index);
        let client_result = match self.config.client_timeout {
            Some(timeout) => tokio::time::timeout(
                timeout,
                self.runtime.run_to_completion(client_machine, &client_options),
            )
            .await
            .unwrap_or(Err(RunToCompletionError::TimedOut { timeout })),
            None => {
                self.runtime
                    .run_to_completion(client_machine, &client_options)
                    .await
            }
        };
        let elapsed = window.finish(client_result.is_err());
        self.reporter.add_operation(&window);

        let client_output = client_result.map_err(TrialError::WorkloadExecution)?;
        for line in client_output.lines() {
            log::debug!(target: "client", "{line}");
        }

        let metrics = self.extractor.extract(results_dir.path())?;
        self.publish(index, &metrics, elapsed);

        Ok(TrialOutcome {
            metrics,
            window: elapsed,
        })
    }

    fn publish(&self, index: usize, metrics: &MetricsRecord, window: Duration) {
        for (name, value) in metrics.observations() {
            self.reporter.add_custom(
                ReportMetric::new(name)
                    .with_value(value)
                    .with_tag("trial", index),
            );
        }
        self.reporter.add_custom(
            ReportMetric::new("trial_window_s")
                .with_value(window.as_secs_f64())
                .with_tag("trial", index),
        );
    }

    async fn visualize(&self, container: &Container) {
        if let Some(visualizer) = &self.visualizer {
            match visualizer.visualize(container).await {
                Ok(artifact) => log::info!(
                    "Logs for {} written to '{}'",
                    container.name,
                    artifact.display()
                ),
                Err(e) => log::warn!("Failed to visualize logs for {}: {e:?}", container.name),
            }
        }
    }
}
