//! `bulkapply config` – print the effective configuration.

use anyhow::Result;
use bulkapply_core::config::{self, BulkApplyConfig};
use std::path::Path;

pub fn run_config(cfg: &BulkApplyConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
