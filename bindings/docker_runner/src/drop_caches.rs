use anyhow::{bail, Context};
use serving_bench_runner::prelude::{async_trait, CacheControl, Machine};

use crate::cli::{combined_output, DockerCli};

/// Image used for the short-lived privileged helper container.
pub const DEFAULT_HELPER_IMAGE: &str = "alpine";

const DROP_CACHES_SCRIPT: &str = "sync; echo 3 > /proc/sys/vm/drop_caches";

/// Drops the page cache of a Docker host from inside a privileged helper container, so no
/// shell access to the host is needed.
#[derive(Debug, Clone)]
pub struct DockerDropCaches {
    cli: DockerCli,
    image: String,
}

impl DockerDropCaches {
    pub fn new(cli: DockerCli) -> Self {
        Self {
            cli,
            image: DEFAULT_HELPER_IMAGE.to_string(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    fn args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--privileged".to_string(),
            self.image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            DROP_CACHES_SCRIPT.to_string(),
        ]
    }
}

#[async_trait]
impl CacheControl for DockerDropCaches {
    async fn drop_caches(&self, machine: &Machine) -> anyhow::Result<()> {
        log::debug!("Dropping page cache on {}", machine.id);

        let output = self
            .cli
            .command(machine)
            .args(self.args())
            .output()
            .await
            .context("Failed to run the drop caches helper")?;
        if !output.status.success() {
            bail!(
                "Dropping caches on {} failed with {}: {}",
                machine.id,
                output.status,
                combined_output(&output).trim()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn helper_is_privileged_and_removed() {
        let drop_caches = DockerDropCaches::new(DockerCli::new("docker")).with_image("busybox");

        assert_eq!(
            vec![
                "run",
                "--rm",
                "--privileged",
                "busybox",
                "sh",
                "-c",
                "sync; echo 3 > /proc/sys/vm/drop_caches",
            ],
            drop_caches.args()
        );
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let drop_caches = DockerDropCaches::new(DockerCli::new("/non/existent/docker"));
        let machine = Machine {
            id: "local".to_string(),
            endpoint: None,
        };

        assert!(drop_caches.drop_caches(&machine).await.is_err());
    }
}
