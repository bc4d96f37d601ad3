// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Config, along with its children VCenter, FailureDomain, DeploymentZone and MachinePool, is the
/// platform section of the install configuration. The config file is deserialized into a Config
/// object.
///
/// The config model is intentionally separate from the in-memory topology model: the config holds
/// the names an administrator chose, the topology cache holds what those names resolve to on the
/// remote endpoint.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub vcenters: Vec<VCenter>,
    #[serde(default)]
    pub failure_domains: Vec<FailureDomain>,
    #[serde(default)]
    pub deployment_zones: Vec<DeploymentZone>,
    #[serde(default)]
    pub machine_pools: Vec<MachinePool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a TOML install config from `path`.
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("could not open config file \"{path}\": {e}")))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    pub fn vcenter(&self, server: &str) -> Option<&VCenter> {
        self.vcenters.iter().find(|vc| vc.server == server)
    }

    pub fn failure_domain(&self, name: &str) -> Option<&FailureDomain> {
        self.failure_domains.iter().find(|fd| fd.name == name)
    }

    pub fn deployment_zone(&self, name: &str) -> Option<&DeploymentZone> {
        self.deployment_zones.iter().find(|dz| dz.name == name)
    }

    pub fn machine_pool(&self, name: &str) -> Option<&MachinePool> {
        self.machine_pools.iter().find(|p| p.name == name)
    }

    /// The failure domains that live on the given vCenter.
    pub fn failure_domains_for<'a>(
        &'a self,
        server: &'a str,
    ) -> impl Iterator<Item = &'a FailureDomain> + 'a {
        self.failure_domains
            .iter()
            .filter(move |fd| fd.server == server)
    }

    /// Check the cross references between the config sections without contacting any endpoint.
    ///
    /// Returns every problem found rather than stopping at the first one, so an administrator can
    /// fix the file in one pass.
    pub fn validate(&self) -> Vec<Error> {
        let mut problems = Vec::new();

        for fd in &self.failure_domains {
            if self.vcenter(&fd.server).is_none() {
                problems.push(Error::UndefinedVCenter {
                    failure_domain: fd.name.clone(),
                    server: fd.server.clone(),
                });
            }
            if fd.topology.networks.is_empty() {
                problems.push(Error::Config(format!(
                    "failure domain \"{}\" declares no networks",
                    fd.name
                )));
            }
        }

        for dz in &self.deployment_zones {
            match self.failure_domain(&dz.failure_domain) {
                None => problems.push(Error::UndefinedFailureDomain {
                    zone: dz.name.clone(),
                    failure_domain: dz.failure_domain.clone(),
                }),
                Some(fd) if fd.server != dz.server => problems.push(Error::Config(format!(
                    "deployment zone \"{}\" is on server \"{}\" but failure domain \"{}\" is on \"{}\"",
                    dz.name, dz.server, fd.name, fd.server
                ))),
                Some(_) => {}
            }
        }

        for pool in &self.machine_pools {
            for zone in &pool.zones {
                if self.deployment_zone(zone).is_none() {
                    problems.push(Error::UndefinedZone {
                        zone: zone.clone(),
                        pool: pool.name.clone(),
                    });
                }
            }
        }

        problems
    }
}

/// A vCenter endpoint together with the credentials used to log into it.
#[derive(Serialize, Deserialize, Clone)]
pub struct VCenter {
    pub server: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub datacenters: Vec<String>,
}

impl std::fmt::Debug for VCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VCenter")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("datacenters", &self.datacenters)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FailureDomain {
    pub name: String,
    pub region: String,
    pub zone: String,
    pub server: String,
    pub topology: Topology,
}

/// Where in the vCenter inventory a failure domain places its machines.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Topology {
    pub datacenter: String,
    pub compute_cluster: String,
    #[serde(default)]
    pub networks: Vec<String>,
    pub datastore: String,
    pub resource_pool: Option<String>,
    pub folder: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeploymentZone {
    pub name: String,
    pub server: String,
    pub failure_domain: String,
    #[serde(default = "default_true")]
    pub control_plane_allowed: bool,
    #[serde(default)]
    pub placement_constraint: PlacementConstraint,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PlacementConstraint {
    pub folder: Option<String>,
    pub resource_pool: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MachineRole {
    ControlPlane,
    #[default]
    Compute,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MachinePool {
    pub name: String,
    #[serde(default)]
    pub role: MachineRole,
    pub replicas: u32,
    #[serde(default)]
    pub zones: Vec<String>,
}

fn default_true() -> bool {
    true
}
