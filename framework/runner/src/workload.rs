//! The collaborators that the orchestrator drives, and the scoped leases that release them.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::output::{AwaitOutputError, RunToCompletionError};

/// An isolated execution target that can host containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    /// Unique for the lifetime of the provider that handed it out.
    pub id: String,
    /// Where the container runtime for this machine can be reached. [None] means the local one.
    pub endpoint: Option<String>,
}

/// A workload started on a [Machine].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub machine: Machine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MountKind {
    #[display("bind")]
    Bind,
    #[display("volume")]
    Volume,
    #[display("tmpfs")]
    Tmpfs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: MountKind,
}

/// How to start a container. Built once per role for each trial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub image: String,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    /// Expose all of the machine's GPUs to the container.
    pub gpus: bool,
    /// CPUs the container is pinned to, in the `0-3,6` list format.
    pub cpuset_cpus: Option<String>,
    pub mounts: Vec<Mount>,
    /// Links to other containers, as produced by [WorkloadRuntime::make_link].
    pub links: Vec<String>,
    /// Command and arguments. Empty to use the image's default.
    pub command: Vec<String>,
}

impl RunOptions {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Options for a container that needs the machine's GPUs.
    pub fn gpu(image: impl Into<String>) -> Self {
        Self {
            gpus: true,
            ..Self::new(image)
        }
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env.push(env.into());
        self
    }

    pub fn with_cpuset_cpus(mut self, cpus: impl Into<String>) -> Self {
        self.cpuset_cpus = Some(cpus.into());
        self
    }

    pub fn with_bind_mount(mut self, source: &Path, target: &Path) -> Self {
        self.mounts.push(Mount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            kind: MountKind::Bind,
        });
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.extend(command.into_iter().map(Into::into));
        self
    }
}

/// Supplies machines on demand.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Lease a machine for exclusive use until it is released.
    async fn acquire(&self) -> anyhow::Result<Machine>;

    fn release(&self, machine: Machine);
}

/// Starts, watches and stops containers.
#[async_trait]
pub trait WorkloadRuntime: Send + Sync {
    /// Start a container in the background.
    async fn start(&self, machine: &Machine, options: &RunOptions) -> anyhow::Result<Container>;

    /// Wait until a line of the container's output contains `pattern`, returning the output seen
    /// so far.
    async fn await_output_pattern(
        &self,
        container: &Container,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, AwaitOutputError>;

    /// Run a container until it exits, returning its combined output.
    ///
    /// Dropping the returned future must remove the container.
    async fn run_to_completion(
        &self,
        machine: &Machine,
        options: &RunOptions,
    ) -> Result<String, RunToCompletionError>;

    /// A link specification that exposes `container` to another container under `alias`.
    fn make_link(&self, container: &Container, alias: &str) -> String;

    /// Stop and remove the container. Must be callable from [Drop].
    fn stop(&self, container: &Container) -> anyhow::Result<()>;
}

/// Invalidates a machine's page cache before measuring.
#[async_trait]
pub trait CacheControl: Send + Sync {
    async fn drop_caches(&self, machine: &Machine) -> anyhow::Result<()>;
}

/// Turns a container's logs into an artifact for later inspection.
#[async_trait]
pub trait LogVisualizer: Send + Sync {
    async fn visualize(&self, container: &Container) -> anyhow::Result<PathBuf>;
}

/// A machine that is released back to its provider when dropped.
pub struct Lease<'a> {
    provider: &'a dyn ResourceProvider,
    machine: Option<Machine>,
}

impl<'a> Lease<'a> {
    pub async fn acquire(provider: &'a dyn ResourceProvider) -> anyhow::Result<Self> {
        let machine = provider.acquire().await?;
        log::debug!("Acquired machine {}", machine.id);
        Ok(Self {
            provider,
            machine: Some(machine),
        })
    }
}

impl Deref for Lease<'_> {
    type Target = Machine;

    fn deref(&self) -> &Self::Target {
        self.machine
            .as_ref()
            .expect("Machine is only taken when the lease is dropped")
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(machine) = self.machine.take() {
            log::debug!("Releasing machine {}", machine.id);
            self.provider.release(machine);
        }
    }
}

/// A running container that is stopped when dropped.
pub struct ContainerLease<'a> {
    runtime: &'a dyn WorkloadRuntime,
    container: Container,
}

impl<'a> ContainerLease<'a> {
    pub async fn start(
        runtime: &'a dyn WorkloadRuntime,
        machine: &Machine,
        options: &RunOptions,
    ) -> anyhow::Result<Self> {
        let container = runtime.start(machine, options).await?;
        log::info!(
            "Started container {} from '{}' on machine {}",
            container.name,
            options.image,
            machine.id
        );
        Ok(Self { runtime, container })
    }
}

impl Deref for ContainerLease<'_> {
    type Target = Container;

    fn deref(&self) -> &Self::Target {
        &self.container
    }
}

impl Drop for ContainerLease<'_> {
    fn drop(&mut self) {
        log::debug!("Stopping container {}", self.container.name);
        if let Err(e) = self.runtime.stop(&self.container) {
            log::error!("Failed to stop container {}: {e:?}", self.container.name);
        }
    }
}
