use std::sync::Arc;

use anyhow::Context;
use serving_bench_core::prelude::ShutdownSignalError;
use serving_bench_instruments::ReportConfig;
use serving_bench_summary_model::{append_run_summary, RunSummary, TrialRecord, TrialStatus};

use crate::cli::ReporterOpt;
use crate::definition::BenchmarkDefinitionBuilder;
use crate::error::{Severity, TrialError};
use crate::executor::Executor;
use crate::orchestrator::Orchestrator;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// Run the trials of a benchmark one after the other.
///
/// Skipped and failed trials are recorded and the run continues. A fatal trial error stops the
/// run and is returned after the reporter has been finalized and the summary written. A Ctrl-C
/// cancels the trial in flight and ends the run early without an error.
pub fn run(definition: BenchmarkDefinitionBuilder) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;

    log::info!(
        "Running benchmark {} ({} trials), run id {}",
        definition.name,
        definition.trials,
        definition.run_id
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Executor::new(runtime, shutdown_handle.clone());

    let report_config = match definition.reporter {
        ReporterOpt::Noop => ReportConfig::default(),
        ReporterOpt::Summary => ReportConfig::default().enable_summary(),
        ReporterOpt::Jsonl => ReportConfig::default()
            .enable_summary()
            .enable_jsonl(definition.metrics_dir.clone(), definition.run_id.clone()),
    };
    let reporter = Arc::new(report_config.init()?);

    let mut orchestrator = Orchestrator::new(
        definition.config.clone(),
        definition.runtime.clone(),
        definition.cache_control.clone(),
        reporter.clone(),
    );
    if let Some(visualizer) = &definition.visualizer {
        orchestrator = orchestrator.with_visualizer(visualizer.clone());
    }

    let mut summary = RunSummary::new(
        definition.run_id.clone(),
        definition.name.clone(),
        chrono::Utc::now().timestamp(),
        definition.trials,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    for (key, value) in &definition.env {
        summary.add_env(key.clone(), value.clone());
    }

    let progress = (!definition.no_progress).then(|| start_progress(definition.trials));
    let mut shutdown_listener = shutdown_handle.new_listener();
    let mut fatal: Option<TrialError> = None;

    for index in 0..definition.trials {
        if shutdown_listener.should_shutdown() {
            log::info!("Shutdown requested, not starting trial {index}");
            break;
        }

        log::info!("Starting trial {index}");
        let result = executor.execute_in_place(async {
            Ok(orchestrator
                .run_trial(
                    index,
                    definition.server_provider.as_ref(),
                    definition.client_provider.as_deref(),
                )
                .await)
        });

        let trial = match result {
            Ok(Ok(outcome)) => {
                log::info!(
                    "Trial {index} completed {} requests in {:.2}s",
                    outcome.metrics.completed,
                    outcome.window.as_secs_f64()
                );
                TrialRecord {
                    index,
                    status: TrialStatus::Completed,
                    window_s: Some(outcome.window.as_secs_f64()),
                    metrics: Some(outcome.metrics),
                    error: None,
                }
            }
            Ok(Err(e)) => {
                match e.severity() {
                    Severity::Skip => log::warn!("Skipping trial {index}: {e}"),
                    Severity::Trial | Severity::Fatal => log::error!("Trial {index} failed: {e}"),
                }
                if let Some(output) = e.output() {
                    log::error!("Captured output for trial {index}:\n{output}");
                }

                let record = TrialRecord {
                    index,
                    status: e.status(),
                    window_s: None,
                    metrics: None,
                    error: Some(e.to_string()),
                };
                if e.severity() == Severity::Fatal {
                    summary.add_trial(record);
                    fatal = Some(e);
                    break;
                }
                record
            }
            Err(e) if e.is::<ShutdownSignalError>() => {
                log::info!("Trial {index} cancelled by shutdown signal");
                break;
            }
            Err(e) => return Err(e),
        };

        summary.add_trial(trial);
        if let Some(progress) = &progress {
            progress.inc(1);
        }
    }

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    reporter.finalize();

    log::info!(
        "Benchmark {} finished: {} completed, {} skipped, {} failed",
        summary.benchmark_name,
        summary.count(TrialStatus::Completed),
        summary.count(TrialStatus::Skipped),
        summary.count(TrialStatus::Failed),
    );

    if let Some(path) = &definition.summary_path {
        // Don't lose a fatal error because the summary could not be written.
        if let Err(e) = append_run_summary(&summary, path.clone()) {
            log::error!("Failed to write run summary to '{}': {e:?}", path.display());
        }
    }

    match fatal {
        Some(e) => Err(anyhow::Error::from(e).context(format!(
            "Benchmark {} stopped by a fatal error",
            summary.benchmark_name
        ))),
        None => Ok(summary),
    }
}
