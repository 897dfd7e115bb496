mod cli;
mod docker_binary;
mod drop_caches;
mod log_archive;
mod provider;
mod runtime;

pub mod prelude {
    pub use crate::cli::{run_args, DockerCli, DOCKER_HOST_ENV};
    pub use crate::docker_binary::{docker_path, SB_DOCKER_PATH_ENV};
    pub use crate::drop_caches::{DockerDropCaches, DEFAULT_HELPER_IMAGE};
    pub use crate::log_archive::LogArchive;
    pub use crate::provider::DockerHostProvider;
    pub use crate::runtime::{DockerRuntime, CONTAINER_NAME_PREFIX};

    /// Re-export of the `serving_bench_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your benchmarks.
    pub use serving_bench_runner::prelude::*;
}
