use crate::engine::{InstanceDescriptor, InstanceSpec, ServerStatus};
use crate::integrations::cloud_interface::{CloudProvisioner, ServerSummary};

use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Build `n` descriptors named `unit-0..n` on one fake network.
pub fn descriptors(n: usize) -> Vec<InstanceDescriptor> {
    (0..n)
        .map(|i| InstanceDescriptor {
            name: format!("unit-{}", i),
            spec: InstanceSpec {
                image_id: "img-1".to_string(),
                flavor_id: "flv-1".to_string(),
                key_name: "crank-key".to_string(),
                networks: vec!["net-a".to_string()],
            },
            availability_zone: None,
        })
        .collect()
}

#[derive(Debug)]
struct MockServer {
    id: String,
    name: String,
    /// Number of status reads that still report BUILD before the terminal
    /// status is handed out.
    polls_left: u32,
    terminal: ServerStatus,
    stuck: bool,
    reached_terminal: bool,
    deleted: bool,
}

#[derive(Default)]
struct MockState {
    servers: Vec<MockServer>,
    /// name -> attempts that must end ERROR before one finally goes ACTIVE
    error_attempts: HashMap<String, u32>,
    /// name -> creation calls that fail outright before one succeeds
    create_failures: HashMap<String, u32>,
    /// names whose build ends in an out-of-band DELETED
    externally_deleted: HashSet<String>,
    /// names that never leave BUILD
    stuck: HashSet<String>,
    next_id: usize,
}

/// Scripted in-memory provisioner used by the engine tests.
#[derive(Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_attempts(&self, name: &str, attempts: u32) {
        self.state
            .lock()
            .unwrap()
            .error_attempts
            .insert(name.to_string(), attempts);
    }

    pub fn fail_create(&self, name: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .create_failures
            .insert(name.to_string(), times);
    }

    pub fn delete_externally(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .externally_deleted
            .insert(name.to_string());
    }

    pub fn stick(&self, name: &str) {
        self.state.lock().unwrap().stuck.insert(name.to_string());
    }

    /// Register a pre-existing server, e.g. another batch's leftovers.
    pub fn seed_server(&self, name: &str, status: ServerStatus) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{:027x}", state.next_id);
        let stuck = !status.is_terminal();
        state.servers.push(MockServer {
            id,
            name: name.to_string(),
            polls_left: 0,
            reached_terminal: status.is_terminal(),
            terminal: status,
            stuck,
            deleted: false,
        });
    }

    /// Highest number of workers that were ever between their create call
    /// and their terminal status read at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn live_server_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .servers
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn live_server_statuses(&self) -> Vec<(String, ServerStatus)> {
        self.state
            .lock()
            .unwrap()
            .servers
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| (s.name.clone(), s.terminal.clone()))
            .collect()
    }
}

impl CloudProvisioner for MockCloud {
    async fn resolve_network_ids(&self, names: &[String]) -> Result<Vec<String>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(names.iter().map(|n| format!("{}-id", n)).collect())
    }

    async fn create_server(
        &self,
        name: &str,
        _spec: &InstanceSpec,
        _availability_zone: Option<&str>,
        _network_ids: &[String],
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();

        if let Some(left) = state.create_failures.get_mut(name) {
            if *left > 0 {
                *left -= 1;
                bail!("creation refused for '{}'", name);
            }
        }

        let stuck = state.stuck.contains(name);
        let terminal = if stuck {
            ServerStatus::Building
        } else if state.externally_deleted.contains(name) {
            ServerStatus::Deleted
        } else {
            match state.error_attempts.get_mut(name) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    ServerStatus::Errored
                }
                _ => ServerStatus::Active,
            }
        };

        state.next_id += 1;
        let id = format!("{:032x}", state.next_id);
        state.servers.push(MockServer {
            id: id.clone(),
            name: name.to_string(),
            polls_left: 1,
            terminal,
            stuck,
            reached_terminal: false,
            deleted: false,
        });
        drop(state);

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(id)
    }

    async fn get_server_status(&self, server_id: &str) -> Result<ServerStatus> {
        let mut state = self.state.lock().unwrap();
        let Some(server) = state.servers.iter_mut().find(|s| s.id == server_id) else {
            bail!("no such server '{}'", server_id);
        };

        if server.stuck {
            return Ok(ServerStatus::Building);
        }
        if server.reached_terminal {
            return Ok(server.terminal.clone());
        }
        if server.polls_left > 0 {
            server.polls_left -= 1;
            return Ok(ServerStatus::Building);
        }

        server.reached_terminal = true;
        let status = server.terminal.clone();
        drop(state);
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(status)
    }

    async fn rename_server(&self, server_id: &str, new_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(server) = state.servers.iter_mut().find(|s| s.id == server_id) else {
            bail!("no such server '{}'", server_id);
        };
        server.name = new_name.to_string();
        Ok(())
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(server) = state.servers.iter_mut().find(|s| s.id == server_id) else {
            bail!("no such server '{}'", server_id);
        };
        if server.deleted {
            bail!("server '{}' is already deleted", server_id);
        }
        server.deleted = true;
        Ok(())
    }

    async fn list_servers(&self) -> Result<Vec<ServerSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .servers
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| ServerSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                status: if s.reached_terminal {
                    s.terminal.clone()
                } else {
                    ServerStatus::Building
                },
            })
            .collect())
    }
}
