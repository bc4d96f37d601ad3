// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod plan;
pub mod resolve;
pub mod validate;

use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    plan::PlanArgs,
};

use crate::{
    config::Config,
    inventory::StaticInventory,
    session::{Connector, SessionCache},
    topology::TopologyCache,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error() -> HandledResult<()> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Install config describing vCenters, failure domains, deployment zones and machine pools.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Inventory file describing what exists on each vCenter, used instead of a live endpoint.
    #[arg(long, global = true)]
    pub inventory: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve every failure domain's cluster and networks and print the result.
    Resolve,
    /// Print the per-zone placement of machine pools.
    Plan(PlanArgs),
    /// Check the config's cross references without contacting any vCenter.
    Validate,
}

/// Everything a command needs for one run: the config, the sessions to each vCenter, and the
/// topology resolved through them.
pub struct Context {
    pub config: Config,
    pub sessions: SessionCache,
    pub topology: TopologyCache,
}

impl Context {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        let sessions = SessionCache::from_endpoints(connector, &config.vcenters);
        Context {
            config,
            sessions,
            topology: TopologyCache::new(),
        }
    }

    /// Resolve the topology of every vCenter in the config, one vCenter at a time.
    pub async fn resolve_all(&self) -> crate::error::Result<()> {
        for vc in &self.config.vcenters {
            self.topology
                .resolve_topology(&self.sessions, vc, &self.config.failure_domains)
                .await?;
        }
        Ok(())
    }
}

pub fn load_config(cli: &Cli) -> HandledResult<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => crate::default_config_path(),
    };
    Config::from_file(&path).handle_err(|e| eprintln!("{e}"))
}

fn load_context(cli: &Cli) -> HandledResult<Context> {
    let config = load_config(cli)?;
    let path = match &cli.inventory {
        Some(path) => path.clone(),
        None => crate::default_inventory_path(),
    };
    let inventory = StaticInventory::from_file(&path).handle_err(|e| eprintln!("{e}"))?;
    Ok(Context::new(config, Arc::new(inventory)))
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    if let Commands::Validate = &cli.command {
        return validate::validate(cli);
    }

    let context = load_context(cli)?;

    let rt = tokio::runtime::Runtime::new()
        .handle_err(|e| eprintln!("Error launching tokio runtime: {e}"))?;

    rt.block_on(async {
        let res = match &cli.command {
            Commands::Resolve => resolve::resolve(cli, &context).await,
            Commands::Plan(args) => plan::plan(args, &context).await,
            Commands::Validate => unreachable!(),
        };
        context.sessions.logout_all().await;
        res
    })
}
