use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use parking_lot::Mutex;
use serving_bench_runner::prelude::{
    async_trait, forward_lines, wait_for_pattern, AwaitOutputError, Container, Machine,
    MountKind, RunOptions, RunToCompletionError, ServingBenchResult, WorkloadRuntime,
};

use crate::cli::{combined_output, is_local_endpoint, run_args, DockerCli};

/// Prefix for the names of containers started by the runtime.
pub const CONTAINER_NAME_PREFIX: &str = "sb-";

/// Runs workloads through the `docker` command line.
///
/// Links only resolve between containers on the same daemon, and bind mount sources are paths on
/// this machine. Foreground runs that break either rule fail to launch.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    cli: DockerCli,
    /// Endpoint of each running container started by [WorkloadRuntime::start], by name.
    placements: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl DockerRuntime {
    pub fn new(cli: DockerCli) -> Self {
        Self {
            cli,
            placements: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check_placement(
        &self,
        machine: &Machine,
        options: &RunOptions,
    ) -> Result<(), RunToCompletionError> {
        let target = machine.endpoint.as_deref().unwrap_or("the local daemon");

        let placements = self.placements.lock();
        for link in &options.links {
            let name = link.split(':').next().unwrap_or(link);
            if let Some(endpoint) = placements.get(name) {
                if *endpoint != machine.endpoint {
                    return Err(RunToCompletionError::Launch {
                        cause: anyhow!(
                            "Linked container {name} runs on {} but this container would run on \
                             {target}, linked containers must share a Docker host",
                            endpoint.as_deref().unwrap_or("the local daemon")
                        ),
                    });
                }
            }
        }

        if !is_local_endpoint(machine.endpoint.as_deref()) {
            if let Some(mount) = options.mounts.iter().find(|m| m.kind == MountKind::Bind) {
                return Err(RunToCompletionError::Launch {
                    cause: anyhow!(
                        "Cannot bind mount '{}' into a container on {target}, bind mounts need a \
                         Docker host that shares this machine's filesystem",
                        mount.source.display()
                    ),
                });
            }
        }

        Ok(())
    }
}

fn new_container_name() -> String {
    format!(
        "{CONTAINER_NAME_PREFIX}{}",
        nanoid::nanoid!(12, &nanoid::alphabet::SAFE)
    )
}

/// Force remove a container, whether it is still running or not.
pub(crate) fn remove_container(
    cli: &DockerCli,
    machine: &Machine,
    name: &str,
) -> ServingBenchResult<()> {
    let output = cli
        .blocking_command(machine)
        .arg("rm")
        .arg("-f")
        .arg(name)
        .output()
        .with_context(|| format!("Failed to run 'docker rm' for {name}"))?;
    if !output.status.success() {
        bail!(
            "'docker rm -f {name}' failed with {}: {}",
            output.status,
            combined_output(&output).trim()
        );
    }
    Ok(())
}

/// Removes a container that was started in the foreground if the wait for it is abandoned.
struct RemoveOnDrop<'a> {
    cli: &'a DockerCli,
    machine: &'a Machine,
    name: &'a str,
    armed: bool,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Removing abandoned container {}", self.name);
            if let Err(e) = remove_container(self.cli, self.machine, self.name) {
                log::error!("Failed to remove container {}: {e:?}", self.name);
            }
        }
    }
}

#[async_trait]
impl WorkloadRuntime for DockerRuntime {
    async fn start(&self, machine: &Machine, options: &RunOptions) -> anyhow::Result<Container> {
        let name = new_container_name();
        log::debug!("Starting {name} from '{}'", options.image);

        let output = self
            .cli
            .command(machine)
            .arg("run")
            .arg("-d")
            .arg("--name")
            .arg(&name)
            .args(run_args(options))
            .output()
            .await
            .context("Failed to run 'docker run'")?;
        if !output.status.success() {
            bail!(
                "'docker run' for '{}' failed with {}: {}",
                options.image,
                output.status,
                combined_output(&output).trim()
            );
        }

        self.placements
            .lock()
            .insert(name.clone(), machine.endpoint.clone());

        Ok(Container {
            id: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            name,
            machine: machine.clone(),
        })
    }

    async fn await_output_pattern(
        &self,
        container: &Container,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, AwaitOutputError> {
        let mut logs = self
            .cli
            .command(&container.machine)
            .arg("logs")
            .arg("-f")
            .arg(&container.name)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AwaitOutputError::Follow {
                cause: anyhow::Error::new(e).context("Failed to run 'docker logs'"),
            })?;

        let stdout = logs.stdout.take().ok_or_else(|| AwaitOutputError::Follow {
            cause: anyhow!("Failed to get stdout of 'docker logs'"),
        })?;
        let stderr = logs.stderr.take().ok_or_else(|| AwaitOutputError::Follow {
            cause: anyhow!("Failed to get stderr of 'docker logs'"),
        })?;

        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let stdout_task = forward_lines(stdout, sender.clone());
        let stderr_task = forward_lines(stderr, sender);

        let result = wait_for_pattern(&mut receiver, pattern, timeout, &container.name).await;

        stdout_task.abort();
        stderr_task.abort();

        result
    }

    async fn run_to_completion(
        &self,
        machine: &Machine,
        options: &RunOptions,
    ) -> Result<String, RunToCompletionError> {
        self.check_placement(machine, options)?;

        let name = new_container_name();
        log::debug!("Running {name} from '{}' to completion", options.image);

        let mut guard = RemoveOnDrop {
            cli: &self.cli,
            machine,
            name: &name,
            armed: true,
        };

        let output = self
            .cli
            .command(machine)
            .arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(&name)
            .args(run_args(options))
            .kill_on_drop(true)
            .output()
            .await;

        // Either `--rm` has removed the container or it never started.
        guard.armed = false;

        let output = output.map_err(|e| RunToCompletionError::Launch {
            cause: anyhow::Error::new(e).context("Failed to run 'docker run'"),
        })?;

        let combined = combined_output(&output);
        if output.status.success() {
            Ok(combined)
        } else {
            Err(RunToCompletionError::Exited {
                status: output.status.to_string(),
                output: combined,
            })
        }
    }

    fn make_link(&self, container: &Container, alias: &str) -> String {
        format!("{}:{alias}", container.name)
    }

    fn stop(&self, container: &Container) -> anyhow::Result<()> {
        self.placements.lock().remove(&container.name);
        remove_container(&self.cli, &container.machine, &container.name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serving_bench_runner::prelude::Mount;

    use super::*;

    fn machine(endpoint: Option<&str>) -> Machine {
        Machine {
            id: endpoint.unwrap_or("local").to_string(),
            endpoint: endpoint.map(str::to_string),
        }
    }

    fn results_mount() -> Mount {
        Mount {
            source: PathBuf::from("/tmp/serving-bench-results-abc"),
            target: PathBuf::from("/tmp"),
            kind: MountKind::Bind,
        }
    }

    #[test]
    fn container_names_are_unique_and_valid() {
        let a = new_container_name();
        let b = new_container_name();

        assert_ne!(a, b);
        assert!(a.starts_with(CONTAINER_NAME_PREFIX));
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn link_uses_container_name() {
        let runtime = DockerRuntime::new(DockerCli::new("docker"));
        let container = Container {
            id: "0123abcd".to_string(),
            name: "sb-server".to_string(),
            machine: Machine {
                id: "local".to_string(),
                endpoint: None,
            },
        };

        assert_eq!("sb-server:vllmctr", runtime.make_link(&container, "vllmctr"));
    }

    #[tokio::test]
    async fn link_to_container_on_another_host_is_rejected() {
        // Running docker would fail to launch too, but with another message
        let runtime = DockerRuntime::new(DockerCli::new("/non/existent/docker"));
        runtime
            .placements
            .lock()
            .insert("sb-server".to_string(), Some("ssh://gpu-1".to_string()));

        let mut options = RunOptions::new("benchmarks/vllm");
        options.links.push("sb-server:vllmctr".to_string());

        let err = runtime
            .run_to_completion(&machine(None), &options)
            .await
            .unwrap_err();

        let RunToCompletionError::Launch { cause } = &err else {
            panic!("expected a launch error, got {err:?}");
        };
        assert!(cause.to_string().contains("must share a Docker host"));
        assert!(cause.to_string().contains("ssh://gpu-1"));
    }

    #[test]
    fn link_to_container_on_the_same_host_is_accepted() {
        let runtime = DockerRuntime::new(DockerCli::new("docker"));
        runtime
            .placements
            .lock()
            .insert("sb-server".to_string(), None);

        let mut options = RunOptions::new("benchmarks/vllm");
        options.links.push("sb-server:vllmctr".to_string());
        options.mounts.push(results_mount());

        assert!(runtime.check_placement(&machine(None), &options).is_ok());
    }

    #[test]
    fn bind_mount_on_remote_host_is_rejected() {
        let runtime = DockerRuntime::new(DockerCli::new("docker"));
        let mut options = RunOptions::new("benchmarks/vllm");
        options.mounts.push(results_mount());

        let err = runtime
            .check_placement(&machine(Some("ssh://gpu-1")), &options)
            .unwrap_err();
        assert!(matches!(err, RunToCompletionError::Launch { .. }));

        assert!(runtime
            .check_placement(&machine(Some("unix:///run/docker-gpu1.sock")), &options)
            .is_ok());
    }

    #[test]
    fn stopped_containers_are_forgotten() {
        let runtime = DockerRuntime::new(DockerCli::new("/non/existent/docker"));
        let container = Container {
            id: "0123abcd".to_string(),
            name: "sb-server".to_string(),
            machine: machine(Some("ssh://gpu-1")),
        };
        runtime
            .placements
            .lock()
            .insert(container.name.clone(), container.machine.endpoint.clone());

        // Removal fails without a docker binary, the container is forgotten regardless
        assert!(runtime.stop(&container).is_err());
        assert!(runtime.placements.lock().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_launch_is_reported() {
        let runtime = DockerRuntime::new(DockerCli::new("/non/existent/docker"));
        let machine = Machine {
            id: "local".to_string(),
            endpoint: None,
        };

        let err = runtime
            .run_to_completion(&machine, &RunOptions::new("alpine"))
            .await
            .unwrap_err();

        assert!(matches!(err, RunToCompletionError::Launch { .. }));
    }
}
