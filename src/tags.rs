// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Region and zone tagging of failure domains.
//!
//! The cluster's cloud provider discovers which region and zone a machine is in by reading tags
//! from the datacenter and the compute cluster the machine runs in.

use std::collections::BTreeSet;

use log::{debug, info};

use crate::{
    config::{FailureDomain, VCenter},
    error::Result,
    session::SessionCache,
    topology::clean_path,
};

pub const REGION_CATEGORY: &str = "openshift-region";
pub const ZONE_CATEGORY: &str = "openshift-zone";

/// Make sure the region and zone tags for every failure domain on `endpoint` exist and are
/// attached to the failure domain's datacenter and compute cluster.
///
/// Existing categories, tags and attachments are reused, so running this twice is harmless.
pub async fn tag_failure_domains(
    sessions: &SessionCache,
    endpoint: &VCenter,
    failure_domains: &[FailureDomain],
) -> Result<()> {
    let server = endpoint.server.as_str();
    let session = sessions.authenticated_session(server).await?;

    session
        .ensure_category(REGION_CATEGORY, &["Datacenter"])
        .await?;
    session
        .ensure_category(ZONE_CATEGORY, &["ClusterComputeResource"])
        .await?;

    let mut tagged = BTreeSet::new();
    for fd in failure_domains.iter().filter(|fd| fd.server == server) {
        let datacenter = clean_path(&format!("/{}", fd.topology.datacenter));
        let cluster = clean_path(&fd.topology.compute_cluster);

        for (category, tag, object) in [
            (REGION_CATEGORY, &fd.region, datacenter),
            (ZONE_CATEGORY, &fd.zone, cluster),
        ] {
            if !tagged.insert((category, tag.clone(), object.clone())) {
                continue;
            }
            debug!("attaching tag {category}:{tag} to \"{object}\"");
            session.ensure_tag(category, tag).await?;
            session.attach_tag(category, tag, &object).await?;
        }
    }

    info!("tagged failure domains on vCenter \"{server}\"");
    Ok(())
}
