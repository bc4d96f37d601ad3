// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::io::{self, Write};

use crate::commands::{Cli, Context, Handle, HandledResult};

pub async fn resolve(cli: &Cli, context: &Context) -> HandledResult<()> {
    context
        .resolve_all()
        .await
        .handle_err(|e| eprintln!("Could not resolve topology: {e}"))?;

    let mut out = io::stdout().lock();
    write_topology(&mut out, context, cli.verbose)
        .handle_err(|e| eprintln!("Could not write output: {e}"))
}

/// Print each vCenter's clusters with the inventory path of every network. With `verbose`, the
/// indexed resource pools are listed too.
pub fn write_topology(out: &mut impl Write, context: &Context, verbose: bool) -> io::Result<()> {
    for vc in &context.config.vcenters {
        let Some(topology) = context.topology.endpoint(&vc.server) else {
            continue;
        };
        writeln!(out, "{} [{}]", vc.server, topology.datacenters.join(", "))?;
        for (path, map) in &topology.clusters {
            writeln!(out, "  {path}")?;
            for (name, network) in map.networks() {
                writeln!(out, "    network {name}: {network}")?;
            }
            if verbose {
                for pool in map.resource_pools() {
                    writeln!(out, "    resource pool: {pool}")?;
                }
            }
        }
    }
    Ok(())
}
