// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::io::{self, Write};

use clap::Args;

use crate::{
    commands::{handled_error, Context, Handle, HandledResult},
    zones::{plan_machine_pool, ZonePlacement},
};

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Only plan the named machine pool.
    #[arg(long)]
    pub pool: Option<String>,
}

pub async fn plan(args: &PlanArgs, context: &Context) -> HandledResult<()> {
    context
        .resolve_all()
        .await
        .handle_err(|e| eprintln!("Could not resolve topology: {e}"))?;

    let pools: Vec<_> = context
        .config
        .machine_pools
        .iter()
        .filter(|p| args.pool.as_ref().map_or(true, |name| &p.name == name))
        .collect();

    if pools.is_empty() {
        eprintln!("No machine pools to plan.");
        return handled_error();
    }

    let mut out = io::stdout().lock();
    for pool in pools {
        let placements = plan_machine_pool(&context.config, &context.topology, pool)
            .handle_err(|e| eprintln!("Could not plan machine pool \"{}\": {e}", pool.name))?;
        writeln!(out, "{} ({} replicas)", pool.name, pool.replicas)
            .handle_err(|e| eprintln!("Could not write output: {e}"))?;
        write_placements(&mut out, &placements)
            .handle_err(|e| eprintln!("Could not write output: {e}"))?;
    }

    Ok(())
}

pub fn write_placements(out: &mut impl Write, placements: &[ZonePlacement]) -> io::Result<()> {
    for placement in placements {
        let zone = placement.zone.as_deref().unwrap_or("<default>");
        match &placement.platform {
            Some(platform) => writeln!(
                out,
                "  {zone}: {} replicas on {} cluster={} pool={} datastore={} network={}",
                placement.replicas,
                platform.server,
                platform.compute_cluster,
                platform.resource_pool,
                platform.datastore,
                platform.network,
            )?,
            None => writeln!(out, "  {zone}: {} replicas", placement.replicas)?,
        }
    }
    Ok(())
}
