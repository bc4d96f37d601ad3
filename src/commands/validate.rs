// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::commands::{handled_error, load_config, Cli, HandledResult};

pub fn validate(cli: &Cli) -> HandledResult<()> {
    let config = load_config(cli)?;

    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration is valid.");
        return Ok(());
    }

    for problem in &problems {
        eprintln!("{problem}");
    }
    handled_error()
}
