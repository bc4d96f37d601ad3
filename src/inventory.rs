// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! An in-memory vCenter inventory implementing [`Connector`].
//!
//! The inventory can be loaded from a TOML file for offline runs of the CLI, and it is what the
//! tests use in place of a real endpoint. Besides answering lookups it counts logins, lets a
//! test expire sessions or take an endpoint offline, and records tag operations.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::{
    error::{Error, Fault, FaultKind},
    session::{
        ClusterHandle, Connection, Connector, EndpointCredential, NetworkHandle,
        ResourcePoolHandle,
    },
    topology::{clean_path, join_path},
};

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct InventoryFile {
    #[serde(default)]
    pub endpoints: Vec<InventoryEndpoint>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InventoryEndpoint {
    pub server: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub clusters: Vec<InventoryCluster>,
}

/// A compute cluster and what lives under it. Relative resource pool and network names are
/// interpreted relative to the cluster path; absolute ones are taken as they are.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InventoryCluster {
    pub path: String,
    #[serde(default)]
    pub resource_pools: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

impl InventoryCluster {
    fn cluster_path(&self) -> String {
        clean_path(&self.path)
    }

    fn resource_pool_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.resource_pools
            .iter()
            .map(|pool| join_path(&self.path, pool))
    }

    fn network_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.networks.iter().map(|net| join_path(&self.path, net))
    }
}

#[derive(Default)]
struct TagState {
    categories: BTreeSet<String>,
    tags: BTreeSet<(String, String)>,
    attachments: BTreeSet<(String, String, String)>,
}

#[derive(Default)]
struct InventoryState {
    endpoints: HashMap<String, InventoryEndpoint>,
    unreachable: BTreeSet<String>,
    logins: HashMap<String, usize>,
    active: HashMap<String, Vec<Arc<AtomicBool>>>,
    tags: HashMap<String, TagState>,
}

pub struct StaticInventory {
    state: Arc<Mutex<InventoryState>>,
    login_delay: Option<Duration>,
    lookup_delay: Option<Duration>,
}

impl StaticInventory {
    pub fn new(file: InventoryFile) -> Self {
        let endpoints = file
            .endpoints
            .into_iter()
            .map(|ep| (ep.server.clone(), ep))
            .collect();
        StaticInventory {
            state: Arc::new(Mutex::new(InventoryState {
                endpoints,
                ..Default::default()
            })),
            login_delay: None,
            lookup_delay: None,
        }
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("could not open inventory file \"{path}\": {e}"))
        })?;
        let file: InventoryFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid inventory file \"{path}\": {e}")))?;
        Ok(Self::new(file))
    }

    /// Make every login take `delay` before it answers.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = Some(delay);
        self
    }

    /// Make every cluster, resource pool and network lookup take `delay` before it answers.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// The number of successful logins to `server` so far.
    pub fn login_count(&self, server: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.logins.get(server).copied().unwrap_or(0)
    }

    /// Expire every session issued for `server`, as if the endpoint had timed them out.
    pub fn invalidate_sessions(&self, server: &str) {
        let state = self.state.lock().unwrap();
        if let Some(flags) = state.active.get(server) {
            for flag in flags {
                flag.store(false, Ordering::SeqCst);
            }
        }
    }

    pub fn set_reachable(&self, server: &str, reachable: bool) {
        let mut state = self.state.lock().unwrap();
        if reachable {
            state.unreachable.remove(server);
        } else {
            state.unreachable.insert(server.to_string());
        }
    }

    /// Remove a network from every cluster on `server`.
    pub fn remove_network(&self, server: &str, path: &str) {
        let path = clean_path(path);
        let mut state = self.state.lock().unwrap();
        if let Some(endpoint) = state.endpoints.get_mut(server) {
            for cluster in endpoint.clusters.iter_mut() {
                let cluster_path = cluster.path.clone();
                cluster
                    .networks
                    .retain(|net| join_path(&cluster_path, net) != path);
            }
        }
    }

    pub fn categories(&self, server: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .tags
            .get(server)
            .map(|t| t.categories.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every (category, tag) pair on `server`.
    pub fn tags(&self, server: &str) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .tags
            .get(server)
            .map(|t| t.tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every (category, tag, object path) attachment on `server`.
    pub fn attachments(&self, server: &str) -> Vec<(String, String, String)> {
        let state = self.state.lock().unwrap();
        state
            .tags
            .get(server)
            .map(|t| t.attachments.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for StaticInventory {
    async fn login(&self, credential: &EndpointCredential) -> Result<Arc<dyn Connection>, Fault> {
        if let Some(delay) = self.login_delay {
            tokio::time::sleep(delay).await;
        }

        let server = &credential.server;
        let mut state = self.state.lock().unwrap();

        if state.unreachable.contains(server) {
            return Err(Fault::new(
                FaultKind::Connectivity,
                format!("dial tcp {server}:443: connect: connection refused"),
            ));
        }

        let Some(endpoint) = state.endpoints.get(server) else {
            return Err(Fault::new(
                FaultKind::Connectivity,
                format!("dial tcp: lookup {server}: no such host"),
            ));
        };

        if endpoint.username != credential.username || endpoint.password != credential.password {
            return Err(Fault::new(
                FaultKind::Authentication,
                "Cannot complete login due to an incorrect user name or password.",
            ));
        }

        let active = Arc::new(AtomicBool::new(true));
        state
            .active
            .entry(server.clone())
            .or_default()
            .push(Arc::clone(&active));
        *state.logins.entry(server.clone()).or_default() += 1;

        Ok(Arc::new(StaticConnection {
            server: server.clone(),
            state: Arc::clone(&self.state),
            active,
            lookup_delay: self.lookup_delay,
        }))
    }
}

struct StaticConnection {
    server: String,
    state: Arc<Mutex<InventoryState>>,
    active: Arc<AtomicBool>,
    lookup_delay: Option<Duration>,
}

impl StaticConnection {
    async fn lookup_delay(&self) {
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `f` against this connection's endpoint, failing if the session has expired or the
    /// endpoint went away.
    fn with_endpoint<T>(
        &self,
        f: impl FnOnce(&InventoryEndpoint) -> T,
    ) -> Result<T, Fault> {
        self.check_active()?;
        let state = self.state.lock().unwrap();
        if state.unreachable.contains(&self.server) {
            return Err(Fault::new(FaultKind::Connectivity, "connection reset by peer"));
        }
        match state.endpoints.get(&self.server) {
            Some(endpoint) => Ok(f(endpoint)),
            None => Err(Fault::new(FaultKind::Connectivity, "endpoint went away")),
        }
    }

    fn with_tags<T>(&self, f: impl FnOnce(&mut TagState) -> T) -> Result<T, Fault> {
        self.check_active()?;
        let mut state = self.state.lock().unwrap();
        Ok(f(state.tags.entry(self.server.clone()).or_default()))
    }

    fn check_active(&self) -> Result<(), Fault> {
        if self.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Fault::new(
                FaultKind::Authentication,
                "The session is not authenticated.",
            ))
        }
    }
}

#[async_trait]
impl Connection for StaticConnection {
    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
            && !self.state.lock().unwrap().unreachable.contains(&self.server)
    }

    async fn logout(&self) -> Result<(), Fault> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn find_cluster(&self, path: &str) -> Result<Option<ClusterHandle>, Fault> {
        self.lookup_delay().await;
        let path = clean_path(path);
        self.with_endpoint(|endpoint| {
            endpoint
                .clusters
                .iter()
                .find(|c| c.cluster_path() == path)
                .map(|c| ClusterHandle {
                    path: c.cluster_path(),
                })
        })
    }

    async fn resource_pools(
        &self,
        cluster: &ClusterHandle,
    ) -> Result<Vec<ResourcePoolHandle>, Fault> {
        self.lookup_delay().await;
        let path = clean_path(&cluster.path);
        self.with_endpoint(|endpoint| {
            endpoint
                .clusters
                .iter()
                .find(|c| c.cluster_path() == path)
                .map(|c| {
                    c.resource_pool_paths()
                        .map(|path| ResourcePoolHandle { path })
                        .collect::<Vec<_>>()
                })
        })?
        .ok_or_else(|| {
            Fault::new(
                FaultKind::NotFound,
                format!("cluster '{}' not found", cluster.path),
            )
        })
    }

    async fn find_network(&self, path: &str) -> Result<Option<NetworkHandle>, Fault> {
        self.lookup_delay().await;
        let path = clean_path(path);
        self.with_endpoint(|endpoint| {
            endpoint
                .clusters
                .iter()
                .flat_map(|c| c.network_paths())
                .find(|net| *net == path)
                .map(|path| NetworkHandle { path })
        })
    }

    async fn ensure_category(&self, name: &str, _associable_types: &[&str]) -> Result<(), Fault> {
        self.with_tags(|tags| {
            tags.categories.insert(name.to_string());
        })
    }

    async fn ensure_tag(&self, category: &str, name: &str) -> Result<(), Fault> {
        self.with_tags(|tags| {
            if !tags.categories.contains(category) {
                return Err(Fault::new(
                    FaultKind::NotFound,
                    format!("tag category '{category}' does not exist"),
                ));
            }
            tags.tags.insert((category.to_string(), name.to_string()));
            Ok(())
        })?
    }

    async fn attach_tag(&self, category: &str, tag: &str, object_path: &str) -> Result<(), Fault> {
        self.with_tags(|tags| {
            if !tags.tags.contains(&(category.to_string(), tag.to_string())) {
                return Err(Fault::new(
                    FaultKind::NotFound,
                    format!("tag '{tag}' does not exist in category '{category}'"),
                ));
            }
            tags.attachments.insert((
                category.to_string(),
                tag.to_string(),
                clean_path(object_path),
            ));
            Ok(())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_inventory_toml() {
        let file: InventoryFile = toml::from_str(
            r#"
[[endpoints]]
server = "vc1"
username = "admin"
password = "secret"

[[endpoints.clusters]]
path = "/dc1/host/c1/"
resource_pools = ["Resources", "Resources/rp1"]
networks = ["network1", "/dc1/network/shared"]
"#,
        )
        .unwrap();

        let cluster = &file.endpoints[0].clusters[0];
        assert_eq!(cluster.cluster_path(), "/dc1/host/c1");
        assert_eq!(
            cluster.resource_pool_paths().collect::<Vec<_>>(),
            vec!["/dc1/host/c1/Resources", "/dc1/host/c1/Resources/rp1"]
        );
        assert_eq!(
            cluster.network_paths().collect::<Vec<_>>(),
            vec!["/dc1/host/c1/network1", "/dc1/network/shared"]
        );
    }

    #[tokio::test]
    async fn wrong_password_is_authentication_fault() {
        let inventory = crate::test_env::three_zone_inventory();
        let credential = EndpointCredential {
            server: "vc1".to_string(),
            username: crate::test_env::USERNAME.to_string(),
            password: "wrong".to_string(),
        };
        let fault = inventory.login(&credential).await.err().unwrap();
        assert_eq!(fault.kind, FaultKind::Authentication);

        let credential = EndpointCredential {
            server: "vc9".to_string(),
            ..credential
        };
        let fault = inventory.login(&credential).await.err().unwrap();
        assert_eq!(fault.kind, FaultKind::Connectivity);
        assert_eq!(inventory.login_count("vc1"), 0);
    }
}
