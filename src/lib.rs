// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod commands;
pub mod config;
pub mod error;
pub mod inventory;
pub mod session;
pub mod tags;
pub mod test_env;
pub mod topology;
pub mod zones;

pub fn default_config_path() -> String {
    match std::env::var("VTOPO_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/vtopo/install-config.toml".to_string(),
    }
}

pub fn default_inventory_path() -> String {
    match std::env::var("VTOPO_INVENTORY") {
        Ok(inventory) => inventory,
        Err(_) => "/etc/vtopo/inventory.toml".to_string(),
    }
}
