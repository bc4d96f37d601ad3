// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use log::{debug, info};

use crate::{
    config::{FailureDomain, VCenter},
    error::{Error, Result},
    session::{ResourcePoolHandle, SessionCache},
};

/// What is known about one compute cluster: the resource pools under it, and the inventory path
/// each logical network name resolved to.
///
/// The map only ever grows. There are no removal methods, so a resolution that fails part way
/// leaves everything written before the failure in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNetworkMap {
    compute_cluster: String,
    resource_pools: BTreeMap<String, ResourcePoolHandle>,
    network_names: BTreeMap<String, String>,
}

impl ClusterNetworkMap {
    pub fn new(compute_cluster: &str) -> Self {
        ClusterNetworkMap {
            compute_cluster: clean_path(compute_cluster),
            resource_pools: BTreeMap::new(),
            network_names: BTreeMap::new(),
        }
    }

    /// Index a resource pool by its cleaned inventory path. Returns false if it was already
    /// indexed.
    pub fn add_resource_pool(&mut self, pool: ResourcePoolHandle) -> bool {
        let path = clean_path(&pool.path);
        if self.resource_pools.contains_key(&path) {
            return false;
        }
        self.resource_pools.insert(path, pool);
        true
    }

    /// Record the inventory path for a logical network name.
    pub fn add_network(&mut self, name: &str, path: &str) {
        self.network_names
            .insert(name.to_string(), path.to_string());
    }

    pub fn compute_cluster(&self) -> &str {
        &self.compute_cluster
    }

    pub fn has_resource_pool(&self, path: &str) -> bool {
        self.resource_pools.contains_key(&clean_path(path))
    }

    pub fn resource_pools(&self) -> impl Iterator<Item = &str> {
        self.resource_pools.keys().map(|p| p.as_str())
    }

    pub fn network(&self, name: &str) -> Option<&str> {
        self.network_names.get(name).map(|p| p.as_str())
    }

    /// (logical name, inventory path) pairs, sorted by name.
    pub fn networks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.network_names
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_str()))
    }

    pub fn num_networks(&self) -> usize {
        self.network_names.len()
    }
}

/// Everything resolved for one vCenter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointTopology {
    pub datacenters: Vec<String>,
    pub clusters: BTreeMap<String, ClusterNetworkMap>,
}

/// The resolved topology of every vCenter used by an installer run.
///
/// Reads take a short lock on the map. Resolution additionally holds a writer lock for the
/// whole pass, so at most one resolution mutates the cache at a time even if callers run
/// concurrently.
#[derive(Debug, Default)]
pub struct TopologyCache {
    endpoints: Mutex<HashMap<String, EndpointTopology>>,
    writer: tokio::sync::Mutex<()>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of what has been resolved for `server`.
    pub fn endpoint(&self, server: &str) -> Option<EndpointTopology> {
        self.endpoints.lock().unwrap().get(server).cloned()
    }

    pub fn cluster_map(&self, server: &str, compute_cluster: &str) -> Option<ClusterNetworkMap> {
        self.endpoints
            .lock()
            .unwrap()
            .get(server)
            .and_then(|t| t.clusters.get(&clean_path(compute_cluster)).cloned())
    }

    fn update<T>(&self, server: &str, f: impl FnOnce(&mut EndpointTopology) -> T) -> T {
        let mut endpoints = self.endpoints.lock().unwrap();
        f(endpoints.entry(server.to_string()).or_default())
    }

    /// Resolve the compute clusters, resource pools and networks named by every failure domain
    /// that lives on `endpoint`.
    ///
    /// Stops at the first cluster or network that cannot be found. Entries recorded before that
    /// point are kept.
    pub async fn resolve_topology(
        &self,
        sessions: &SessionCache,
        endpoint: &VCenter,
        failure_domains: &[FailureDomain],
    ) -> Result<()> {
        let _writer = self.writer.lock().await;
        let server = endpoint.server.as_str();

        let session = sessions.authenticated_session(server).await?;

        self.update(server, |topology| {
            for dc in &endpoint.datacenters {
                if !topology.datacenters.contains(dc) {
                    topology.datacenters.push(dc.clone());
                }
            }
        });

        for fd in failure_domains.iter().filter(|fd| fd.server == server) {
            let cluster_path = clean_path(&fd.topology.compute_cluster);
            debug!(
                "resolving failure domain \"{}\" on cluster \"{cluster_path}\"",
                fd.name
            );

            let Some(cluster) = session.find_cluster(&cluster_path).await? else {
                return Err(Error::ClusterNotFound {
                    server: server.to_string(),
                    cluster: cluster_path,
                });
            };

            let pools = session.resource_pools(&cluster).await?;
            self.update(server, |topology| {
                let map = topology
                    .clusters
                    .entry(cluster_path.clone())
                    .or_insert_with(|| ClusterNetworkMap::new(&cluster_path));
                for pool in pools {
                    map.add_resource_pool(pool);
                }
            });

            for network in &fd.topology.networks {
                let path = network_inventory_path(&cluster_path, network);
                if session.find_network(&path).await?.is_none() {
                    return Err(Error::NetworkNotFound {
                        server: server.to_string(),
                        network: network.clone(),
                        path,
                    });
                }

                debug!("network \"{network}\" resolved to \"{path}\"");
                self.update(server, |topology| {
                    topology
                        .clusters
                        .entry(cluster_path.clone())
                        .or_insert_with(|| ClusterNetworkMap::new(&cluster_path))
                        .add_network(network, &path);
                });
            }
        }

        info!("resolved topology for vCenter \"{server}\"");
        Ok(())
    }

    /// Find the full inventory path of a logical network as seen from `resource_pool`.
    ///
    /// A value that already looks like a path is returned unchanged. Otherwise the first cluster
    /// on `server` that both knows the name and contains the resource pool wins; clusters are
    /// scanned in path order.
    pub fn resolve_network_path(
        &self,
        server: &str,
        name_or_path: &str,
        resource_pool: &str,
    ) -> Result<String> {
        if name_or_path.contains('/') {
            return Ok(name_or_path.to_string());
        }

        let endpoints = self.endpoints.lock().unwrap();
        if let Some(topology) = endpoints.get(server) {
            for map in topology.clusters.values() {
                if let Some(path) = map.network(name_or_path) {
                    if map.has_resource_pool(resource_pool) {
                        return Ok(path.to_string());
                    }
                }
            }
        }

        Err(Error::NetworkNotFoundInResourcePool {
            network: name_or_path.to_string(),
            resource_pool: resource_pool.to_string(),
        })
    }
}

/// The inventory path a failure domain's network name refers to: the name under the compute
/// cluster, unless it is already a path.
pub fn network_inventory_path(compute_cluster: &str, network: &str) -> String {
    join_path(compute_cluster, network)
}

/// Join `child` onto `parent` unless `child` is already absolute, and clean the result.
pub fn join_path(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        clean_path(child)
    } else {
        clean_path(&format!("{parent}/{child}"))
    }
}

/// Lexically clean an inventory path: collapse repeated separators, drop `.` elements, resolve
/// `..` against the preceding element, and remove any trailing separator.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean() {
        assert_eq!(clean_path("/dc1//host/c1/"), "/dc1/host/c1");
        assert_eq!(clean_path("/dc1/host/./c1/../c2"), "/dc1/host/c2");
        assert_eq!(clean_path("/../dc1"), "/dc1");
        assert_eq!(clean_path("a/../../b"), "../b");
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("/"), "/");
    }

    #[test]
    fn network_path_join() {
        assert_eq!(
            network_inventory_path("/dc1/host/c1", "network1"),
            "/dc1/host/c1/network1"
        );
        assert_eq!(
            network_inventory_path("/dc1/host/c1", "/dc1/network/vm-net"),
            "/dc1/network/vm-net"
        );
    }

    #[test]
    fn map_is_idempotent() {
        let mut map = ClusterNetworkMap::new("/dc1/host/c1/");
        assert_eq!(map.compute_cluster(), "/dc1/host/c1");

        assert!(map.add_resource_pool(ResourcePoolHandle {
            path: "/dc1/host/c1/Resources/".to_string(),
        }));
        assert!(!map.add_resource_pool(ResourcePoolHandle {
            path: "/dc1/host/c1/Resources".to_string(),
        }));
        assert!(map.has_resource_pool("/dc1/host/c1//Resources"));

        map.add_network("network1", "/dc1/host/c1/network1");
        map.add_network("network1", "/dc1/host/c1/network1");
        assert_eq!(map.num_networks(), 1);
        assert_eq!(map.network("network1"), Some("/dc1/host/c1/network1"));
    }

    #[test]
    fn path_input_bypasses_lookup() {
        let cache = TopologyCache::new();
        assert_eq!(
            cache
                .resolve_network_path("vc1", "/dc1/network/vm-net", "/dc1/host/c1/Resources")
                .unwrap(),
            "/dc1/network/vm-net"
        );

        let err = cache
            .resolve_network_path("vc1", "network1", "/dc1/host/c1/Resources")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NetworkNotFoundInResourcePool { network, .. } if network == "network1"
        ));
    }
}
