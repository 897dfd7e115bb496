use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::workload::RunOptions;

/// How long to wait for the server's readiness line unless configured otherwise.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything the orchestrator needs to know about the server/client pair it benchmarks.
///
/// Passed to the orchestrator when it is created. There is no global benchmark state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServingBenchmarkConfig {
    /// Options for the inference server container.
    pub server: RunOptions,
    /// Substring of a server output line that means the server accepts requests.
    pub ready_pattern: String,
    pub ready_timeout: Duration,
    /// Network alias the client uses to reach the server.
    pub server_alias: String,
    /// Options for the load generator container, without the server link and result mount.
    pub client: RunOptions,
    /// Where the empty results directory is mounted inside the client container.
    pub result_mount_target: PathBuf,
    /// Upper bound on the load generation phase. [None] waits for as long as the client runs.
    pub client_timeout: Option<Duration>,
}

impl ServingBenchmarkConfig {
    pub fn new(server: RunOptions, ready_pattern: impl Into<String>, client: RunOptions) -> Self {
        Self {
            server,
            ready_pattern: ready_pattern.into(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            server_alias: "server".to_string(),
            client,
            result_mount_target: PathBuf::from("/tmp"),
            client_timeout: None,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_server_alias(mut self, alias: impl Into<String>) -> Self {
        self.server_alias = alias.into();
        self
    }

    pub fn with_result_mount_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.result_mount_target = target.into();
        self
    }

    pub fn with_client_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Client options for one trial: linked to the server and writing results into `results_dir`.
    pub fn client_run_options(&self, server_link: String, results_dir: &Path) -> RunOptions {
        self.client
            .clone()
            .with_link(server_link)
            .with_bind_mount(results_dir, &self.result_mount_target)
    }
}

#[cfg(test)]
mod tests {
    use crate::workload::MountKind;

    use super::*;

    #[test]
    fn client_options_link_and_mount() {
        let config = ServingBenchmarkConfig::new(
            RunOptions::gpu("server-image"),
            "ready",
            RunOptions::new("client-image").with_command(["bench"]),
        )
        .with_server_alias("vllmctr");

        let options = config.client_run_options(
            "server-123:vllmctr".to_string(),
            Path::new("/var/tmp/results-1"),
        );

        assert_eq!(vec!["server-123:vllmctr"], options.links);
        assert_eq!(1, options.mounts.len());
        assert_eq!(PathBuf::from("/var/tmp/results-1"), options.mounts[0].source);
        assert_eq!(PathBuf::from("/tmp"), options.mounts[0].target);
        assert_eq!(MountKind::Bind, options.mounts[0].kind);
        assert_eq!(vec!["bench"], options.command);
        // The base options are untouched
        assert!(config.client.links.is_empty());
    }

    #[test]
    fn defaults() {
        let config =
            ServingBenchmarkConfig::new(RunOptions::new("a"), "ready", RunOptions::new("b"));
        assert_eq!(DEFAULT_READY_TIMEOUT, config.ready_timeout);
        assert_eq!(None, config.client_timeout);
    }
}
