use anyhow::bail;
use parking_lot::Mutex;
use serving_bench_runner::prelude::{async_trait, Machine, ResourceProvider};

use crate::cli::is_local_endpoint;

/// A fixed pool of Docker hosts, each of which runs one container at a time for a given role.
#[derive(Debug)]
pub struct DockerHostProvider {
    hosts: Vec<Machine>,
    in_use: Mutex<Vec<bool>>,
}

impl DockerHostProvider {
    /// A pool containing only the local Docker daemon.
    pub fn local() -> Self {
        Self::with_machines(vec![Machine {
            id: "local".to_string(),
            endpoint: None,
        }])
    }

    /// A pool of remote daemons, each given as a `DOCKER_HOST` value such as `ssh://user@host`.
    ///
    /// Falls back to the local daemon when no hosts are given.
    pub fn from_hosts(hosts: &[String]) -> Self {
        if hosts.is_empty() {
            return Self::local();
        }

        Self::with_machines(
            hosts
                .iter()
                .map(|host| Machine {
                    id: host.clone(),
                    endpoint: Some(host.clone()),
                })
                .collect(),
        )
    }

    /// Like [DockerHostProvider::from_hosts], but every host must be a daemon on this machine.
    ///
    /// Use this when workloads bind mount directories from the runner's filesystem.
    pub fn from_local_hosts(hosts: &[String]) -> anyhow::Result<Self> {
        let remote: Vec<&str> = hosts
            .iter()
            .map(String::as_str)
            .filter(|host| !is_local_endpoint(Some(host)))
            .collect();
        if !remote.is_empty() {
            bail!(
                "Results are bind mounted from this machine, so every host must be a local \
                 daemon, got remote hosts: {}",
                remote.join(", ")
            );
        }

        Ok(Self::from_hosts(hosts))
    }

    fn with_machines(hosts: Vec<Machine>) -> Self {
        let in_use = Mutex::new(vec![false; hosts.len()]);
        Self { hosts, in_use }
    }

    /// How many hosts are not currently leased.
    pub fn available(&self) -> usize {
        self.in_use.lock().iter().filter(|used| !**used).count()
    }
}

#[async_trait]
impl ResourceProvider for DockerHostProvider {
    async fn acquire(&self) -> anyhow::Result<Machine> {
        let mut in_use = self.in_use.lock();
        match in_use.iter().position(|used| !used) {
            Some(index) => {
                in_use[index] = true;
                Ok(self.hosts[index].clone())
            }
            None => bail!(
                "no machine available, all {} hosts are in use",
                self.hosts.len()
            ),
        }
    }

    fn release(&self, machine: Machine) {
        match self.hosts.iter().position(|host| host.id == machine.id) {
            Some(index) => self.in_use.lock()[index] = false,
            None => log::warn!("Released machine {} that is not in the pool", machine.id),
        }
    }
}
