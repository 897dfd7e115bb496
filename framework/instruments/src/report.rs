mod in_memory_reporter;
mod jsonl_file_reporter;

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use crate::OperationRecord;

pub use in_memory_reporter::InMemoryReporter;
pub use jsonl_file_reporter::JsonlFileReporter;

/// A single named numeric observation, such as the request throughput of one trial.
///
/// The reported timestamp for the metric will be the current time when the metric is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetric {
    pub name: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: SystemTime,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl ReportMetric {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            timestamp: SystemTime::now(),
            value: 0.0,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(name.into(), value.to_string());
        self
    }
}

fn serialize_timestamp<S: serde::Serializer>(
    timestamp: &SystemTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let nanos = timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    serializer.serialize_u64(nanos)
}

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Record a custom metric
    fn add_custom(&mut self, metric: ReportMetric);

    fn finalize(&mut self);
}
