use std::path::PathBuf;
use std::process::{Output, Stdio};

use serving_bench_runner::prelude::{Machine, Mount, MountKind, RunOptions, ServingBenchResult};

use crate::docker_binary::docker_path;

/// Environment variable that points the Docker CLI at a remote daemon.
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Whether a `DOCKER_HOST` value names a daemon that shares this machine's filesystem.
///
/// No endpoint means the default local daemon.
pub fn is_local_endpoint(endpoint: Option<&str>) -> bool {
    match endpoint {
        None => true,
        Some(endpoint) => endpoint.starts_with("unix://") || endpoint.starts_with("npipe://"),
    }
}

/// Builds invocations of the `docker` command line for a given machine.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Use the binary found by [docker_path].
    pub fn from_env() -> ServingBenchResult<Self> {
        Ok(Self::new(docker_path()?))
    }

    /// A `docker` command that talks to the daemon of `machine`.
    pub fn command(&self, machine: &Machine) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.binary);
        if let Some(endpoint) = &machine.endpoint {
            command.env(DOCKER_HOST_ENV, endpoint);
        }
        command.stdin(Stdio::null());
        command
    }

    /// Blocking version of [DockerCli::command], for use where there is no async context.
    pub fn blocking_command(&self, machine: &Machine) -> std::process::Command {
        let mut command = std::process::Command::new(&self.binary);
        if let Some(endpoint) = &machine.endpoint {
            command.env(DOCKER_HOST_ENV, endpoint);
        }
        command.stdin(Stdio::null());
        command
    }
}

/// The `docker run` arguments that follow the subcommand and its mode flags, up to and including
/// the image and its command.
pub fn run_args(options: &RunOptions) -> Vec<String> {
    let mut args = Vec::new();

    if options.gpus {
        args.push("--gpus".to_string());
        args.push("all".to_string());
    }
    if let Some(cpus) = &options.cpuset_cpus {
        args.push("--cpuset-cpus".to_string());
        args.push(cpus.clone());
    }
    for env in &options.env {
        args.push("-e".to_string());
        args.push(env.clone());
    }
    for mount in &options.mounts {
        args.push("--mount".to_string());
        args.push(mount_arg(mount));
    }
    for link in &options.links {
        args.push("--link".to_string());
        args.push(link.clone());
    }

    args.push(options.image.clone());
    args.extend(options.command.iter().cloned());

    args
}

fn mount_arg(mount: &Mount) -> String {
    match mount.kind {
        MountKind::Tmpfs => format!("type=tmpfs,target={}", mount.target.display()),
        MountKind::Bind | MountKind::Volume => format!(
            "type={},source={},target={}",
            mount.kind,
            mount.source.display(),
            mount.target.display()
        ),
    }
}

/// Stdout followed by stderr, lossily decoded.
pub(crate) fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}
