// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use log::debug;

use crate::{
    config::{Config, DeploymentZone, MachinePool, MachineRole},
    error::{Error, Result},
    topology::{clean_path, join_path, TopologyCache},
};

/// The number of replicas assigned to one zone. `zone` is None when the pool is not zoned and
/// the default platform values apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReplicas {
    pub zone: Option<String>,
    pub replicas: u32,
}

pub type ReplicaAllocation = Vec<ZoneReplicas>;

/// Split `total` replicas over `zones`.
///
/// Every zone gets `total / zones.len()` replicas and the remainder goes one each to the first
/// zones in the given order, so the result is reproducible and always sums to `total`. With no
/// zones the whole total goes to a single unzoned entry.
pub fn distribute_replicas<S: AsRef<str>>(zones: &[S], total: u32) -> ReplicaAllocation {
    if zones.is_empty() {
        return vec![ZoneReplicas {
            zone: None,
            replicas: total,
        }];
    }

    let count = zones.len() as u32;
    let base = total / count;
    let remainder = (total % count) as usize;

    zones
        .iter()
        .enumerate()
        .map(|(i, zone)| ZoneReplicas {
            zone: Some(zone.as_ref().to_string()),
            replicas: if i < remainder { base + 1 } else { base },
        })
        .collect()
}

/// The concrete placement of a zone's machines on a vCenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePlatform {
    pub server: String,
    pub datacenter: String,
    pub compute_cluster: String,
    pub resource_pool: String,
    pub datastore: String,
    pub folder: Option<String>,
    /// Full inventory path of the machine network.
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePlacement {
    pub zone: Option<String>,
    pub replicas: u32,
    /// None for an unzoned pool, which keeps the default platform values.
    pub platform: Option<ZonePlatform>,
}

/// The zones a pool uses when it names none itself: every deployment zone in declaration order,
/// restricted to zones that accept control plane machines for a control plane pool.
pub fn default_zones(config: &Config, pool: &MachinePool) -> Vec<String> {
    config
        .deployment_zones
        .iter()
        .filter(|dz| pool.role != MachineRole::ControlPlane || dz.control_plane_allowed)
        .map(|dz| dz.name.clone())
        .collect()
}

/// Work out how many machines of `pool` go to each zone and where on the vCenter each zone puts
/// them.
///
/// All zones are checked before anything is allocated, and any failure returns no placements at
/// all.
pub fn plan_machine_pool(
    config: &Config,
    topology: &TopologyCache,
    pool: &MachinePool,
) -> Result<Vec<ZonePlacement>> {
    let zones = if pool.zones.is_empty() {
        default_zones(config, pool)
    } else {
        pool.zones.clone()
    };

    let mut deployment_zones = Vec::with_capacity(zones.len());
    for name in &zones {
        let Some(dz) = config.deployment_zone(name) else {
            return Err(Error::UndefinedZone {
                zone: name.clone(),
                pool: pool.name.clone(),
            });
        };
        if pool.role == MachineRole::ControlPlane && !dz.control_plane_allowed {
            return Err(Error::ControlPlaneNotAllowed {
                zone: name.clone(),
                pool: pool.name.clone(),
            });
        }
        deployment_zones.push(dz);
    }

    let allocation = distribute_replicas(zones.as_slice(), pool.replicas);
    debug!("machine pool \"{}\" allocation: {allocation:?}", pool.name);

    if deployment_zones.is_empty() {
        return Ok(allocation
            .into_iter()
            .map(|a| ZonePlacement {
                zone: None,
                replicas: a.replicas,
                platform: None,
            })
            .collect());
    }

    allocation
        .into_iter()
        .zip(deployment_zones)
        .map(|(a, dz)| {
            Ok(ZonePlacement {
                zone: a.zone,
                replicas: a.replicas,
                platform: Some(zone_platform(config, topology, dz)?),
            })
        })
        .collect()
}

/// Follow a deployment zone to its failure domain and vCenter and fill in the placement.
fn zone_platform(
    config: &Config,
    topology: &TopologyCache,
    dz: &DeploymentZone,
) -> Result<ZonePlatform> {
    let Some(fd) = config.failure_domain(&dz.failure_domain) else {
        return Err(Error::UndefinedFailureDomain {
            zone: dz.name.clone(),
            failure_domain: dz.failure_domain.clone(),
        });
    };

    let Some(vcenter) = config.vcenter(&fd.server) else {
        return Err(Error::UndefinedVCenter {
            failure_domain: fd.name.clone(),
            server: fd.server.clone(),
        });
    };

    let compute_cluster = clean_path(&fd.topology.compute_cluster);
    let resource_pool = dz
        .placement_constraint
        .resource_pool
        .as_ref()
        .or(fd.topology.resource_pool.as_ref())
        .map(|rp| clean_path(rp))
        .unwrap_or_else(|| join_path(&compute_cluster, "Resources"));
    let folder = dz
        .placement_constraint
        .folder
        .clone()
        .or_else(|| fd.topology.folder.clone());

    let Some(network) = fd.topology.networks.first() else {
        return Err(Error::Config(format!(
            "failure domain \"{}\" declares no networks",
            fd.name
        )));
    };
    let network = topology.resolve_network_path(&vcenter.server, network, &resource_pool)?;

    Ok(ZonePlatform {
        server: vcenter.server.clone(),
        datacenter: fd.topology.datacenter.clone(),
        compute_cluster,
        resource_pool,
        datastore: fd.topology.datastore.clone(),
        folder,
        network,
    })
}
