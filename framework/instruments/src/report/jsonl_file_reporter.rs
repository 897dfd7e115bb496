use crate::report::{ReportCollector, ReportMetric};
use crate::OperationRecord;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write operations and metrics to disk, one JSON object per line.
///
/// A new file named `<run_id>.jsonl` is created in the configured directory for every run.
pub struct JsonlFileReporter {
    path: PathBuf,
    writer: BufWriter<File>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Operation {
        operation_id: &'a str,
        elapsed_ms: Option<f64>,
        is_error: bool,
        attr: &'a BTreeMap<String, String>,
    },
    Metric(&'a ReportMetric),
}

impl JsonlFileReporter {
    pub fn new(dir: PathBuf, run_id: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create metrics directory '{}'", dir.display()))?;

        let path = dir.join(format!("{run_id}.jsonl"));
        let file = File::options()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to create metrics file '{}'", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &Line<'_>) {
        let result = serde_json::to_writer(&mut self.writer, line)
            .map_err(anyhow::Error::from)
            .and_then(|_| self.writer.write_all(b"\n").map_err(anyhow::Error::from));
        if let Err(e) = result {
            log::warn!("Failed to write to '{}': {e:?}", self.path.display());
        }
    }
}

impl ReportCollector for JsonlFileReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.write_line(&Line::Operation {
            operation_id: &operation_record.operation_id,
            elapsed_ms: operation_record
                .duration()
                .map(|d| d.as_micros() as f64 / 1000.0),
            is_error: operation_record.is_error,
            attr: &operation_record.attr,
        });
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.write_line(&Line::Metric(&metric));
    }

    fn finalize(&mut self) {
        // Ensure everything that's buffered has been written to disk.
        if let Err(e) = self.writer.flush() {
            log::error!("Failed to flush '{}': {e:?}", self.path.display());
        } else {
            log::debug!("Metrics written to '{}'", self.path.display());
        }
    }
}
