// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use vtopo_lib::commands::{self, Cli};

/// The vtopo binary resolves failure domain topology and plans machine pool placement.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("VTOPO_LOG", "warn")).init();

    let args = Cli::parse();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
