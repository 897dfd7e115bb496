use serde::{Deserialize, Serialize};

/// Serving statistics written by the load generator at the end of a trial.
///
/// Modeled after the result file written by vLLM's `benchmark_serving.py --save-result`. Keys
/// map one to one onto the snake-case field names. Unknown keys, such as the per-request
/// `ttfts` and `itls` arrays, are ignored. Missing keys take the zero value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsRecord {
    /// Wall-clock duration of the load generation, in seconds.
    pub duration: f64,
    /// Number of requests that completed successfully.
    pub completed: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Completed requests per second.
    pub request_throughput: f64,
    /// Input tokens per second.
    pub input_throughput: f64,
    /// Output tokens per second.
    pub output_throughput: f64,
    pub mean_ttft_ms: f64,
    pub median_ttft_ms: f64,
    pub p99_ttft_ms: f64,
    pub mean_tpot_ms: f64,
    pub median_tpot_ms: f64,
    pub p99_tpot_ms: f64,
}

impl MetricsRecord {
    /// Find the first throughput field that is negative or not a finite number.
    pub(crate) fn invalid_throughput_field(&self) -> Option<&'static str> {
        [
            ("request_throughput", self.request_throughput),
            ("input_throughput", self.input_throughput),
            ("output_throughput", self.output_throughput),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite() || *value < 0.0)
        .map(|(name, _)| name)
    }

    /// The metrics published for each trial, as `(name, value)` pairs.
    ///
    /// The first six names are the headline observations. The rest carry the remaining fields
    /// of the record so that nothing parsed is thrown away.
    pub fn observations(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("requests", self.completed as f64),
            ("request_throughput", self.request_throughput),
            ("input_tok_throughput", self.input_throughput),
            ("output_tok_throughput", self.output_throughput),
            ("median_ttft_ms", self.median_ttft_ms),
            ("median_tpot_ms", self.median_tpot_ms),
            ("duration_s", self.duration),
            ("total_input_tokens", self.total_input_tokens as f64),
            ("total_output_tokens", self.total_output_tokens as f64),
            ("mean_ttft_ms", self.mean_ttft_ms),
            ("p99_ttft_ms", self.p99_ttft_ms),
            ("mean_tpot_ms", self.mean_tpot_ms),
            ("p99_tpot_ms", self.p99_tpot_ms),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_observations_come_first() {
        let record = MetricsRecord {
            completed: 42,
            request_throughput: 3.5,
            input_throughput: 100.0,
            output_throughput: 200.0,
            median_ttft_ms: 12.1,
            median_tpot_ms: 4.4,
            ..Default::default()
        };

        let names = record
            .observations()
            .into_iter()
            .take(6)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                ("requests", 42.0),
                ("request_throughput", 3.5),
                ("input_tok_throughput", 100.0),
                ("output_tok_throughput", 200.0),
                ("median_ttft_ms", 12.1),
                ("median_tpot_ms", 4.4),
            ]
        );
    }

    #[test]
    fn negative_throughput_is_invalid() {
        let record = MetricsRecord {
            output_throughput: -1.0,
            ..Default::default()
        };
        assert_eq!(Some("output_throughput"), record.invalid_throughput_field());
        assert_eq!(None, MetricsRecord::default().invalid_throughput_field());
    }
}
