use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep metrics in memory only
    Noop,
    /// Print a summary table of operations and metrics at the end of the run
    Summary,
    /// Print the summary and also write every operation and metric to a JSON lines file in
    /// `--metrics-dir`
    Jsonl,
}

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct ServingBenchCli {
    /// The number of trials to run, one after the other
    #[clap(long, short = 'n', default_value_t = 1)]
    pub trials: usize,

    /// Seconds to wait for the server to report that it is ready, overrides the benchmark default
    #[clap(long)]
    pub ready_timeout: Option<u64>,

    /// Seconds to allow the client workload to run before it is stopped and the trial is failed.
    ///
    /// By default the client is allowed to run until it exits.
    #[clap(long)]
    pub client_timeout: Option<u64>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Where to send reported metrics
    #[clap(long, value_enum, default_value_t = ReporterOpt::Summary)]
    pub reporter: ReporterOpt,

    /// Directory for the JSON lines metrics file
    #[clap(long, default_value = "metrics")]
    pub metrics_dir: PathBuf,

    /// Identifier for this run. A random one is generated if not provided.
    #[clap(long)]
    pub run_id: Option<String>,

    /// Directory to archive server logs into after each trial
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Container runtime endpoint to run trials on. May be repeated to provide a pool, each trial
    /// runs its server and client together on one host. Defaults to the local runtime.
    ///
    /// Results are written to a directory on this machine, so hosts must share its filesystem.
    #[clap(long)]
    pub host: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = ServingBenchCli::parse_from(["vllm_serving"]);
        assert_eq!(1, cli.trials);
        assert_eq!(ReporterOpt::Summary, cli.reporter);
        assert_eq!(None, cli.client_timeout);
        assert!(cli.host.is_empty());
    }

    #[test]
    fn repeated_hosts() {
        let cli = ServingBenchCli::parse_from([
            "vllm_serving",
            "-n",
            "5",
            "--reporter",
            "jsonl",
            "--host",
            "unix:///run/docker-gpu0.sock",
            "--host",
            "unix:///run/docker-gpu1.sock",
            "--client-timeout",
            "900",
        ]);
        assert_eq!(5, cli.trials);
        assert_eq!(ReporterOpt::Jsonl, cli.reporter);
        assert_eq!(
            vec!["unix:///run/docker-gpu0.sock", "unix:///run/docker-gpu1.sock"],
            cli.host
        );
        assert_eq!(Some(900), cli.client_timeout);
    }
}
