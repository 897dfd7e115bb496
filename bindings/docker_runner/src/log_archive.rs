use std::path::PathBuf;

use anyhow::{bail, Context};
use serving_bench_runner::prelude::{async_trait, Container, LogVisualizer};

use crate::cli::DockerCli;

/// Saves the full log of a container to `<dir>/<container name>.log`.
#[derive(Debug, Clone)]
pub struct LogArchive {
    cli: DockerCli,
    dir: PathBuf,
}

impl LogArchive {
    pub fn new(cli: DockerCli, dir: impl Into<PathBuf>) -> Self {
        Self {
            cli,
            dir: dir.into(),
        }
    }

    fn log_path(&self, container: &Container) -> PathBuf {
        self.dir.join(format!("{}.log", container.name))
    }
}

#[async_trait]
impl LogVisualizer for LogArchive {
    async fn visualize(&self, container: &Container) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create log directory '{}'", self.dir.display()))?;

        let output = self
            .cli
            .command(&container.machine)
            .arg("logs")
            .arg("--timestamps")
            .arg(&container.name)
            .output()
            .await
            .context("Failed to run 'docker logs'")?;
        if !output.status.success() {
            bail!(
                "'docker logs {}' failed with {}",
                container.name,
                output.status
            );
        }

        // Servers log to both streams. Keep them together.
        let mut content = output.stdout;
        content.extend_from_slice(&output.stderr);

        let path = self.log_path(container);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use serving_bench_runner::prelude::Machine;

    use super::*;

    #[test]
    fn log_named_after_container() {
        let archive = LogArchive::new(DockerCli::new("docker"), "/var/log/bench");
        let container = Container {
            id: "0123abcd".to_string(),
            name: "sb-server".to_string(),
            machine: Machine {
                id: "local".to_string(),
                endpoint: None,
            },
        };

        assert_eq!(
            PathBuf::from("/var/log/bench/sb-server.log"),
            archive.log_path(&container)
        );
    }

    #[tokio::test]
    async fn creates_log_dir_even_if_logs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let archive = LogArchive::new(DockerCli::new("/non/existent/docker"), &log_dir);
        let container = Container {
            id: "0123abcd".to_string(),
            name: "sb-server".to_string(),
            machine: Machine {
                id: "local".to_string(),
                endpoint: None,
            },
        };

        assert!(archive.visualize(&container).await.is_err());
        assert!(log_dir.is_dir());
    }
}
