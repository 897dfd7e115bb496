use tabled::Tabled;

/// One row per metric name, describing the values reported across trials.
#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub name: String,
    #[tabled(rename = "Trials")]
    pub count: usize,
    #[tabled(rename = "Mean", display = "float3")]
    pub mean: f64,
    #[tabled(rename = "Min", display = "float3")]
    pub min: f64,
    #[tabled(rename = "Max", display = "float3")]
    pub max: f64,
}

impl MetricRow {
    pub fn from_values(name: String, values: &[f64]) -> Self {
        let count = values.len();
        let mean = if count == 0 {
            0.0
        } else {
            values.iter().sum::<f64>() / count as f64
        };

        Self {
            name,
            count,
            mean,
            min: values.iter().copied().reduce(f64::min).unwrap_or_default(),
            max: values.iter().copied().reduce(f64::max).unwrap_or_default(),
        }
    }
}

fn float3(n: &f64) -> String {
    format!("{n:.3}")
}
