// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Fixtures shared by the unit and integration tests.
//!
//! The standard environment is one vCenter, `vc1`, with three datacenters `dc1`..`dc3`. Each
//! datacenter has one compute cluster `/dcN/host/cN` holding the resource pools `Resources` and
//! `Resources/rpN` and a network named `network1`. Every datacenter is one failure domain `fdN`
//! and one deployment zone `zoneN`.

use std::sync::Arc;

use crate::{
    config::{
        Config, DeploymentZone, FailureDomain, MachinePool, MachineRole, PlacementConstraint,
        Topology, VCenter,
    },
    inventory::{InventoryCluster, InventoryEndpoint, InventoryFile, StaticInventory},
    session::{Connector, SessionCache},
};

pub const SERVER: &str = "vc1";
pub const USERNAME: &str = "administrator@vsphere.local";
pub const PASSWORD: &str = "hunter2";

/// Given a relative `path` in the test directory, prepend the full path to the test directory.
pub fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
}

pub fn cluster_path(n: usize) -> String {
    format!("/dc{n}/host/c{n}")
}

pub fn resource_pool_path(n: usize) -> String {
    format!("/dc{n}/host/c{n}/Resources/rp{n}")
}

pub fn failure_domain(n: usize) -> FailureDomain {
    FailureDomain {
        name: format!("fd{n}"),
        region: format!("region{n}"),
        zone: format!("zone{n}"),
        server: SERVER.to_string(),
        topology: Topology {
            datacenter: format!("dc{n}"),
            compute_cluster: cluster_path(n),
            networks: vec!["network1".to_string()],
            datastore: format!("/dc{n}/datastore/ds{n}"),
            resource_pool: Some(resource_pool_path(n)),
            folder: Some(format!("/dc{n}/vm/cluster")),
        },
    }
}

pub fn deployment_zone(n: usize) -> DeploymentZone {
    DeploymentZone {
        name: format!("zone{n}"),
        server: SERVER.to_string(),
        failure_domain: format!("fd{n}"),
        control_plane_allowed: true,
        placement_constraint: PlacementConstraint::default(),
    }
}

pub fn vcenter() -> VCenter {
    VCenter {
        server: SERVER.to_string(),
        user: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        datacenters: (1..=3).map(|n| format!("dc{n}")).collect(),
    }
}

/// The standard three-zone install config with a control plane pool of three replicas spread
/// over all zones.
pub fn three_zone_config() -> Config {
    Config {
        vcenters: vec![vcenter()],
        failure_domains: (1..=3).map(failure_domain).collect(),
        deployment_zones: (1..=3).map(deployment_zone).collect(),
        machine_pools: vec![MachinePool {
            name: "master".to_string(),
            role: MachineRole::ControlPlane,
            replicas: 3,
            zones: (1..=3).map(|n| format!("zone{n}")).collect(),
        }],
    }
}

pub fn three_zone_inventory_file() -> InventoryFile {
    InventoryFile {
        endpoints: vec![InventoryEndpoint {
            server: SERVER.to_string(),
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            clusters: (1..=3)
                .map(|n| InventoryCluster {
                    path: cluster_path(n),
                    resource_pools: vec!["Resources".to_string(), format!("Resources/rp{n}")],
                    networks: vec!["network1".to_string()],
                })
                .collect(),
        }],
    }
}

pub fn three_zone_inventory() -> StaticInventory {
    StaticInventory::new(three_zone_inventory_file())
}

/// A session cache over `inventory` with the credentials for [`vcenter`] registered.
pub fn session_cache(inventory: &Arc<StaticInventory>) -> SessionCache {
    SessionCache::from_endpoints(
        Arc::clone(inventory) as Arc<dyn Connector>,
        &[vcenter()],
    )
}
