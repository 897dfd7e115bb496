mod extract;
mod metrics;

pub use extract::{
    extract_metrics, ExtractError, ResultExtractor, SelectionPolicy, RESULT_FILE_SUFFIX,
};
pub use metrics::MetricsRecord;

use anyhow::Context;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// How a single trial ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// Metrics were extracted and published.
    Completed,
    /// An environment precondition was not met so the trial was not measured.
    Skipped,
    /// The client workload or the metrics extraction failed.
    Failed,
    /// The environment is broken and the run was stopped.
    Fatal,
}

/// Record of one trial within a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialRecord {
    /// Zero based position of the trial in the run
    pub index: usize,
    pub status: TrialStatus,
    /// Wall-clock seconds between starting and stopping the client, if it got that far
    pub window_s: Option<f64>,
    /// The parsed metrics, only present for [TrialStatus::Completed]
    pub metrics: Option<MetricsRecord>,
    /// Description of the error for trials that did not complete
    pub error: Option<String>,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the benchmark that was run
    pub benchmark_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The number of trials that were requested
    ///
    /// Fewer trials are recorded if the run was stopped by a fatal error or a shutdown signal.
    pub trial_count: usize,
    /// The outcome of each trial that was attempted
    pub trials: Vec<TrialRecord>,
    /// Environment variables and settings that affect the result
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of or
    /// that are included by the benchmark itself.
    pub env: HashMap<String, String>,
    /// The version of Serving Bench that was used for this run
    pub serving_bench_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        benchmark_name: String,
        started_at: i64,
        trial_count: usize,
        serving_bench_version: String,
    ) -> Self {
        Self {
            run_id,
            benchmark_name,
            started_at,
            trial_count,
            trials: Vec::new(),
            env: HashMap::with_capacity(0),
            serving_bench_version,
        }
    }

    pub fn add_trial(&mut self, trial: TrialRecord) {
        self.trials.push(trial);
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Number of trials that ended with the given status
    pub fn count(&self, status: TrialStatus) -> usize {
        self.trials.iter().filter(|t| t.status == status).count()
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the
    /// benchmark. It uses the
    ///     - Benchmark name
    ///     - Trial count
    ///     - Selected environment variables
    ///     - Serving Bench version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.benchmark_name.as_bytes());
        Digest::update(&mut hasher, (self.trial_count as u64).to_le_bytes());
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.serving_bench_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run = load_run_summary(line.as_bytes())
            .with_context(|| format!("Invalid run summary on line {}", number + 1))?;
        runs.push(run);
    }
    Ok(runs)
}
