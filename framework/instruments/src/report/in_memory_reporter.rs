mod custom_metrics_table;
mod operations_table;

use crate::report::in_memory_reporter::custom_metrics_table::MetricRow;
use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::{ReportCollector, ReportMetric};
use crate::OperationRecord;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::Table;

/// Keeps every operation and custom metric in memory and prints a summary of both at the end of
/// the run.
#[derive(Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
    custom_metrics: Vec<ReportMetric>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn operation_rows(&self) -> Vec<OperationRow> {
        self.operation_records
            .iter()
            .filter_map(|record| record.duration().map(|d| (record, d)))
            .fold(BTreeMap::new(), |mut acc, (record, duration)| {
                acc.entry(record.operation_id.clone())
                    .or_insert_with(Vec::new)
                    .push((record.is_error, duration.as_micros() as f64 / 1000.0));
                acc
            })
            .into_iter()
            .map(|(operation_id, operations)| {
                let total_operations = operations.len();
                let total_duration_ms = operations.iter().map(|(_, ms)| ms).sum::<f64>();
                let successful = operations
                    .iter()
                    .filter(|(is_error, _)| !is_error)
                    .map(|(_, ms)| *ms)
                    .collect::<Vec<_>>();

                OperationRow {
                    operation_id,
                    total_operations,
                    errors: total_operations - successful.len(),
                    total_duration_ms,
                    avg_time_ms: total_duration_ms / total_operations as f64,
                    min_time_ms: successful.iter().copied().reduce(f64::min),
                    max_time_ms: successful.iter().copied().reduce(f64::max),
                }
            })
            .collect()
    }

    pub(crate) fn metric_rows(&self) -> Vec<MetricRow> {
        self.custom_metrics
            .iter()
            .fold(BTreeMap::new(), |mut acc, metric| {
                acc.entry(metric.name.clone())
                    .or_insert_with(Vec::new)
                    .push(metric.value);
                acc
            })
            .into_iter()
            .map(|(name, values)| MetricRow::from_values(name, &values))
            .collect()
    }

    fn print_summary(&self) {
        let operations = self.operation_rows();
        if !operations.is_empty() {
            println!("\nSummary of operations");
            let mut table = Table::new(operations);
            table.with(Style::modern());
            println!("{table}");
        }

        let metrics = self.metric_rows();
        if !metrics.is_empty() {
            println!("\nSummary of metrics");
            let mut table = Table::new(metrics);
            table.with(Style::modern());
            println!("{table}");
        }
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.custom_metrics.push(metric);
    }

    fn finalize(&mut self) {
        self.print_summary();
    }
}
