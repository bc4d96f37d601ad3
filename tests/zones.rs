// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::runtime::Runtime;

    use vtopo_lib::{
        config::{Config, MachinePool, MachineRole},
        error::Error,
        test_env,
        topology::TopologyCache,
        zones::{default_zones, plan_machine_pool},
    };

    /// Resolve the topology for `config` against the standard test inventory.
    fn resolved(config: &Config) -> TopologyCache {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = test_env::session_cache(&inventory);
        let topology = TopologyCache::new();

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            for vc in &config.vcenters {
                topology
                    .resolve_topology(&sessions, vc, &config.failure_domains)
                    .await
                    .unwrap();
            }
        });
        topology
    }

    fn compute_pool(replicas: u32, zones: &[&str]) -> MachinePool {
        MachinePool {
            name: "worker".to_string(),
            role: MachineRole::Compute,
            replicas,
            zones: zones.iter().map(|z| z.to_string()).collect(),
        }
    }

    #[test]
    fn one_replica_per_zone() {
        let config = test_env::three_zone_config();
        let topology = resolved(&config);

        let placements =
            plan_machine_pool(&config, &topology, &config.machine_pools[0]).unwrap();

        assert_eq!(placements.len(), 3);
        for (i, placement) in placements.iter().enumerate() {
            let n = i + 1;
            assert_eq!(placement.zone.as_deref(), Some(format!("zone{n}").as_str()));
            assert_eq!(placement.replicas, 1);

            let platform = placement.platform.as_ref().unwrap();
            assert_eq!(platform.server, "vc1");
            assert_eq!(platform.datacenter, format!("dc{n}"));
            assert_eq!(platform.compute_cluster, test_env::cluster_path(n));
            assert_eq!(platform.resource_pool, test_env::resource_pool_path(n));
            assert_eq!(platform.datastore, format!("/dc{n}/datastore/ds{n}"));
            assert_eq!(platform.network, format!("/dc{n}/host/c{n}/network1"));
        }
    }

    #[test]
    fn uneven_split_follows_zone_order() {
        let config = test_env::three_zone_config();
        let topology = resolved(&config);

        let pool = compute_pool(5, &["zone3", "zone1", "zone2"]);
        let placements = plan_machine_pool(&config, &topology, &pool).unwrap();
        let counts: Vec<_> = placements
            .iter()
            .map(|p| (p.zone.clone().unwrap(), p.replicas))
            .collect();

        assert_eq!(
            counts,
            vec![
                ("zone3".to_string(), 2),
                ("zone1".to_string(), 2),
                ("zone2".to_string(), 1),
            ]
        );
    }

    #[test]
    fn undefined_zone_fails_closed() {
        let config = test_env::three_zone_config();
        let topology = resolved(&config);

        let pool = compute_pool(3, &["zone1", "zone7", "zone2"]);
        let err = plan_machine_pool(&config, &topology, &pool).unwrap_err();

        assert!(matches!(
            err,
            Error::UndefinedZone { ref zone, ref pool } if zone == "zone7" && pool == "worker"
        ));
    }

    #[test]
    fn undefined_failure_domain() {
        let mut config = test_env::three_zone_config();
        config.deployment_zones[1].failure_domain = "fd9".to_string();
        let topology = resolved(&config);

        let err = plan_machine_pool(&config, &topology, &config.machine_pools[0]).unwrap_err();
        assert!(matches!(
            err,
            Error::UndefinedFailureDomain { ref zone, ref failure_domain }
                if zone == "zone2" && failure_domain == "fd9"
        ));
    }

    #[test]
    fn undefined_vcenter() {
        let mut config = test_env::three_zone_config();
        let topology = resolved(&config);
        config.failure_domains[2].server = "vc9".to_string();

        let err = plan_machine_pool(&config, &topology, &config.machine_pools[0]).unwrap_err();
        assert!(matches!(
            err,
            Error::UndefinedVCenter { ref failure_domain, ref server }
                if failure_domain == "fd3" && server == "vc9"
        ));
    }

    #[test]
    fn control_plane_placement_restrictions() {
        let mut config = test_env::three_zone_config();
        config.deployment_zones[2].control_plane_allowed = false;
        let topology = resolved(&config);

        let err = plan_machine_pool(&config, &topology, &config.machine_pools[0]).unwrap_err();
        assert!(matches!(err, Error::ControlPlaneNotAllowed { ref zone, .. } if zone == "zone3"));

        // Without explicit zones, the control plane only lands in zones that allow it.
        let mut pool = config.machine_pools[0].clone();
        pool.zones.clear();
        assert_eq!(default_zones(&config, &pool), vec!["zone1", "zone2"]);

        let placements = plan_machine_pool(&config, &topology, &pool).unwrap();
        let counts: Vec<u32> = placements.iter().map(|p| p.replicas).collect();
        assert_eq!(counts, vec![2, 1]);

        // Compute pools may still use every zone.
        let pool = compute_pool(3, &[]);
        assert_eq!(default_zones(&config, &pool).len(), 3);
    }

    #[test]
    fn placement_constraint_overrides_failure_domain() {
        let mut config = test_env::three_zone_config();
        config.deployment_zones[0].placement_constraint.resource_pool =
            Some("/dc1/host/c1/Resources/".to_string());
        config.deployment_zones[0].placement_constraint.folder = Some("/dc1/vm/other".to_string());
        let topology = resolved(&config);

        let pool = compute_pool(1, &["zone1"]);
        let placements = plan_machine_pool(&config, &topology, &pool).unwrap();
        let platform = placements[0].platform.as_ref().unwrap();

        assert_eq!(platform.resource_pool, "/dc1/host/c1/Resources");
        assert_eq!(platform.folder.as_deref(), Some("/dc1/vm/other"));
        assert_eq!(platform.network, "/dc1/host/c1/network1");
    }

    #[test]
    fn default_resource_pool() {
        let mut config = test_env::three_zone_config();
        config.failure_domains[0].topology.resource_pool = None;
        let topology = resolved(&config);

        let pool = compute_pool(2, &["zone1"]);
        let placements = plan_machine_pool(&config, &topology, &pool).unwrap();
        let platform = placements[0].platform.as_ref().unwrap();

        assert_eq!(placements[0].replicas, 2);
        assert_eq!(platform.resource_pool, "/dc1/host/c1/Resources");
    }

    #[test]
    fn unzoned_pool() {
        let mut config = test_env::three_zone_config();
        config.deployment_zones.clear();
        let topology = resolved(&config);

        let pool = compute_pool(4, &[]);
        let placements = plan_machine_pool(&config, &topology, &pool).unwrap();

        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].zone, None);
        assert_eq!(placements[0].replicas, 4);
        assert!(placements[0].platform.is_none());
    }

    #[test]
    fn unresolved_topology_fails() {
        let config = test_env::three_zone_config();
        let topology = TopologyCache::new();

        let err = plan_machine_pool(&config, &topology, &config.machine_pools[0]).unwrap_err();
        assert!(matches!(err, Error::NetworkNotFoundInResourcePool { .. }));
    }
}
