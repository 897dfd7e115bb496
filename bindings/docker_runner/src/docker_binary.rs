use std::env;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use serving_bench_runner::prelude::ServingBenchResult;

/// Environment variable to override the path to the Docker binary used to run containers.
pub const SB_DOCKER_PATH_ENV: &str = "SB_DOCKER_PATH";

/// Get the path to the Docker binary.
///
/// If the [`SB_DOCKER_PATH_ENV`] environment variable is set, its value is used as the path to
/// the Docker binary. Otherwise `docker` is looked up in the user's `PATH`.
pub fn docker_path() -> ServingBenchResult<PathBuf> {
    resolve_docker_path(env::var(SB_DOCKER_PATH_ENV).ok().as_deref())
}

fn resolve_docker_path(overridden: Option<&str>) -> ServingBenchResult<PathBuf> {
    match overridden {
        Some("") => {
            bail!("'{SB_DOCKER_PATH_ENV}' set to empty string");
        }
        Some("docker") | None => {
            log::debug!("'{SB_DOCKER_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which("docker").with_context(|| {
                format!(
                    "Docker binary not found in PATH. Please install Docker or set '{SB_DOCKER_PATH_ENV}' to the correct path."
                )
            })
        }
        Some(path) => {
            let docker_path = PathBuf::from(path);
            if !docker_path.exists() {
                bail!(
                    "Path to Docker binary overwritten with '{SB_DOCKER_PATH_ENV}={path}' but that path doesn't exist",
                    path = docker_path.display()
                );
            }
            Ok(docker_path)
        }
    }
}
