// Copyright (c) 2024 Botho Foundation

use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::{config::Config, engine::Engine};

/// Write a default config and create an empty ledger
pub fn run(config_path: &Path) -> Result<()> {
    if Config::exists(config_path) {
        bail!(
            "Config already exists at {}\nUse another --config path or remove it first.",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(config_path)?;

    let ledger_path = config.ledger_path(config_path);
    Engine::open(&config, &ledger_path)?;

    info!("Initialized ZMT ledger at {}", ledger_path.display());
    println!("Config saved to: {}", config_path.display());
    println!("Ledger created at: {}", ledger_path.display());
    println!("\nNext steps:");
    println!("  1. Run 'zmt register <username>' to create an account");
    println!("  2. Run 'zmt start <username>' to start mining");

    Ok(())
}
