use std::sync::Arc;

use docker_serving_bench_runner::prelude::*;

const IMAGE: &str = "benchmarks/vllm";
const PYTHONPATH: &str = "PYTHONPATH=$PYTHONPATH:/vllm";
const CPUS: &str = "0";
const SERVER_ALIAS: &str = "vllmctr";
const READY_PATTERN: &str = "Uvicorn running on http://0.0.0.0:8000";

fn vllm_config() -> ServingBenchmarkConfig {
    let server = RunOptions::gpu(IMAGE)
        .with_env(PYTHONPATH)
        .with_cpuset_cpus(CPUS);

    let client = RunOptions::new(IMAGE)
        .with_env(PYTHONPATH)
        .with_cpuset_cpus(CPUS)
        .with_command([
            "/vllm/benchmarks/benchmark_serving.py",
            "--host",
            SERVER_ALIAS,
            "--model",
            "/model",
            "--tokenizer",
            "/model",
            "--endpoint",
            "/v1/completions",
            "--backend",
            "openai",
            "--dataset",
            "/ShareGPT_V3_unfiltered_cleaned_split.json",
            "--save-result",
            "--result-dir",
            "/tmp",
        ]);

    ServingBenchmarkConfig::new(server, READY_PATTERN, client)
        .with_server_alias(SERVER_ALIAS)
        .with_result_mount_target("/tmp")
}

fn main() -> ServingBenchResult<()> {
    let cli = init();
    let docker = DockerCli::from_env()?;

    // The client joins the server's host, no separate client provider
    let hosts = Arc::new(DockerHostProvider::from_local_hosts(&cli.host)?);
    let log_dir = cli.log_dir.clone();

    let mut builder = BenchmarkDefinitionBuilder::new(env!("CARGO_PKG_NAME"), cli, vllm_config())
        .use_server_provider(hosts)
        .use_runtime(Arc::new(DockerRuntime::new(docker.clone())))
        .use_cache_control(Arc::new(DockerDropCaches::new(docker.clone())))
        .add_env("image", IMAGE)
        .add_env("cpuset_cpus", CPUS);
    if let Some(log_dir) = log_dir {
        builder = builder.use_visualizer(Arc::new(LogArchive::new(docker, log_dir)));
    }

    run(builder)?;

    Ok(())
}
