#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serving_bench_runner::prelude::*;

pub const READY_LINE: &str = "INFO:     Uvicorn running on http://0.0.0.0:8000";
pub const READY_PATTERN: &str = "Uvicorn running on http://0.0.0.0:8000";

pub const RESULT_42: &str = r#"{"completed": 42, "request_throughput": 3.5, "input_throughput": 120.0, "output_throughput": 240.5, "median_ttft_ms": 12.1, "median_tpot_ms": 4.4}"#;

/// Hands out numbered machines, or refuses to when empty.
pub struct StubProvider {
    name: String,
    available: bool,
    next: AtomicUsize,
    pub released: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            next: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn empty(name: &str) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    pub fn acquired(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.released.lock().len()
    }
}

#[async_trait]
impl ResourceProvider for StubProvider {
    async fn acquire(&self) -> anyhow::Result<Machine> {
        if !self.available {
            anyhow::bail!("no {} machine available", self.name);
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(Machine {
            id: format!("{}-{n}", self.name),
            endpoint: None,
        })
    }

    fn release(&self, machine: Machine) {
        self.released.lock().push(machine.id);
    }
}

pub struct StubCacheControl {
    pub fail: bool,
}

#[async_trait]
impl CacheControl for StubCacheControl {
    async fn drop_caches(&self, _machine: &Machine) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("permission denied writing /proc/sys/vm/drop_caches");
        }
        Ok(())
    }
}

/// What the stub client does when it is run.
#[derive(Clone)]
pub enum ClientBehaviour {
    /// Write each `(file name, content)` into the results directory and exit cleanly.
    Write(Vec<(String, String)>),
    /// Exit with a failure after printing the output.
    Fail(String),
    /// Never exit.
    Hang,
}

impl ClientBehaviour {
    pub fn result(content: &str) -> Self {
        ClientBehaviour::Write(vec![(
            "openai-infqps-model.json".to_string(),
            content.to_string(),
        )])
    }
}

/// Results directory as the stub client found it.
#[derive(Debug, Clone)]
pub struct SeenDir {
    pub path: PathBuf,
    pub was_empty: bool,
}

pub struct StubRuntime {
    pub server_output: Vec<String>,
    pub client: ClientBehaviour,
    next: AtomicUsize,
    pub started: Mutex<Vec<RunOptions>>,
    pub stopped: Mutex<Vec<String>>,
    pub client_runs: Mutex<Vec<RunOptions>>,
    /// Ids of the machines each client ran on.
    pub client_machines: Mutex<Vec<String>>,
    pub seen_dirs: Mutex<Vec<SeenDir>>,
}

impl StubRuntime {
    pub fn new(client: ClientBehaviour) -> Self {
        Self {
            server_output: vec!["INFO loading model".to_string(), READY_LINE.to_string()],
            client,
            next: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            client_runs: Mutex::new(Vec::new()),
            client_machines: Mutex::new(Vec::new()),
            seen_dirs: Mutex::new(Vec::new()),
        }
    }

    /// A server that never reports it is ready.
    pub fn silent_server(client: ClientBehaviour) -> Self {
        Self {
            server_output: vec!["INFO loading model".to_string()],
            ..Self::new(client)
        }
    }

    fn results_dir(options: &RunOptions) -> PathBuf {
        options
            .mounts
            .iter()
            .find(|m| m.target == Path::new("/tmp"))
            .map(|m| m.source.clone())
            .expect("client must have a results mount")
    }
}

#[async_trait]
impl WorkloadRuntime for StubRuntime {
    async fn start(&self, machine: &Machine, options: &RunOptions) -> anyhow::Result<Container> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        self.started.lock().push(options.clone());
        Ok(Container {
            id: format!("id-{n}"),
            name: format!("server-{n}"),
            machine: machine.clone(),
        })
    }

    async fn await_output_pattern(
        &self,
        _container: &Container,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, AwaitOutputError> {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        for line in &self.server_output {
            sender.send(line.clone()).unwrap();
        }
        // The sender stays alive so the stream is silent rather than closed.
        let result = wait_for_pattern(&mut receiver, pattern, timeout, "stub_server").await;
        drop(sender);
        result
    }

    async fn run_to_completion(
        &self,
        machine: &Machine,
        options: &RunOptions,
    ) -> Result<String, RunToCompletionError> {
        self.client_runs.lock().push(options.clone());
        self.client_machines.lock().push(machine.id.clone());
        let dir = Self::results_dir(options);
        let was_empty = std::fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        self.seen_dirs.lock().push(SeenDir {
            path: dir.clone(),
            was_empty,
        });

        match &self.client {
            ClientBehaviour::Write(files) => {
                for (name, content) in files {
                    std::fs::write(dir.join(name), content).unwrap();
                }
                Ok("Successful requests: 42\n".to_string())
            }
            ClientBehaviour::Fail(output) => Err(RunToCompletionError::Exited {
                status: "exit status: 1".to_string(),
                output: output.clone(),
            }),
            ClientBehaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn make_link(&self, container: &Container, alias: &str) -> String {
        format!("{}:{alias}", container.name)
    }

    fn stop(&self, container: &Container) -> anyhow::Result<()> {
        self.stopped.lock().push(container.name.clone());
        Ok(())
    }
}

/// Records which containers were visualized, optionally failing.
pub struct StubVisualizer {
    pub fail: bool,
    pub seen: Mutex<Vec<String>>,
}

#[async_trait]
impl LogVisualizer for StubVisualizer {
    async fn visualize(&self, container: &Container) -> anyhow::Result<PathBuf> {
        self.seen.lock().push(container.name.clone());
        if self.fail {
            anyhow::bail!("no space left on device");
        }
        Ok(PathBuf::from(format!("/logs/{}.log", container.name)))
    }
}

pub fn sample_config() -> ServingBenchmarkConfig {
    ServingBenchmarkConfig::new(
        RunOptions::gpu("benchmarks/vllm")
            .with_env("PYTHONPATH=$PYTHONPATH:/vllm")
            .with_cpuset_cpus("0"),
        READY_PATTERN,
        RunOptions::new("benchmarks/vllm")
            .with_cpuset_cpus("0")
            .with_command(["/vllm/benchmarks/benchmark_serving.py", "--host", "vllmctr"]),
    )
    .with_server_alias("vllmctr")
    .with_ready_timeout(Duration::from_secs(5))
}

pub fn sample_cli(trials: usize) -> ServingBenchCli {
    ServingBenchCli {
        trials,
        ready_timeout: None,
        client_timeout: None,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        metrics_dir: PathBuf::from("metrics"),
        run_id: None,
        log_dir: None,
        host: vec![],
    }
}
