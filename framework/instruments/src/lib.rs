mod report;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub use report::{InMemoryReporter, JsonlFileReporter, ReportCollector, ReportMetric};

/// A timed operation, such as the measurement window of a trial.
///
/// The clock starts when the record is created and stops when [OperationRecord::finish] is called.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub attr: BTreeMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attr.insert(name.into(), value.to_string());
        self
    }

    /// Stop the clock. Calling this more than once keeps the first elapsed time.
    pub fn finish(&mut self, is_error: bool) -> Duration {
        let elapsed = *self.elapsed.get_or_insert_with(|| self.started.elapsed());
        self.is_error = is_error;
        elapsed
    }

    /// The measured duration, if the operation has finished.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// Fans operations and custom metrics out to the configured collectors.
///
/// Every custom metric is also kept in memory for the lifetime of the reporter so that callers
/// can inspect what was published.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
    custom_metrics: Mutex<Vec<ReportMetric>>,
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn add_custom(&self, metric: ReportMetric) {
        for collector in &self.collectors {
            collector.lock().add_custom(metric.clone());
        }
        self.custom_metrics.lock().push(metric);
    }

    /// Every custom metric reported so far, in the order it was reported.
    pub fn custom_metrics(&self) -> Vec<ReportMetric> {
        self.custom_metrics.lock().clone()
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.lock().finalize();
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

/// Chooses which collectors a [Reporter] writes to.
#[derive(Debug, Default, Clone)]
pub struct ReportConfig {
    enable_summary: bool,
    jsonl: Option<(PathBuf, String)>,
}

impl ReportConfig {
    /// Print a summary of operations and metrics when the reporter is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    /// Write every operation and metric as a JSON line to a new file in `dir`.
    pub fn enable_jsonl(mut self, dir: PathBuf, run_id: impl Into<String>) -> Self {
        self.jsonl = Some((dir, run_id.into()));
        self
    }

    pub fn init(self) -> anyhow::Result<Reporter> {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>> = Vec::new();
        if self.enable_summary {
            collectors.push(Mutex::new(Box::new(InMemoryReporter::new())));
        }
        if let Some((dir, run_id)) = self.jsonl {
            collectors.push(Mutex::new(Box::new(JsonlFileReporter::new(dir, &run_id)?)));
        }

        Ok(Reporter {
            collectors,
            custom_metrics: Mutex::new(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_keeps_first_duration() {
        let mut record = OperationRecord::new("trial_window");
        let first = record.finish(false);
        std::thread::sleep(Duration::from_millis(5));
        let second = record.finish(true);

        assert_eq!(first, second);
        assert_eq!(Some(first), record.duration());
        assert!(record.is_error);
    }

    #[test]
    fn reporter_keeps_custom_metrics() {
        let reporter = ReportConfig::default()
            .init()
            .expect("failed to create reporter");
        reporter.add_custom(ReportMetric::new("requests").with_value(42.0));
        reporter.add_custom(ReportMetric::new("median_ttft_ms").with_value(12.1));

        let metrics = reporter.custom_metrics();
        assert_eq!(2, metrics.len());
        assert_eq!("requests", metrics[0].name);
        assert_eq!(12.1, metrics[1].value);
    }
}
