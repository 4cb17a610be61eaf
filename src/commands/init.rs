//! `init-config`: write a starter configuration file.

use anyhow::Result;
use std::path::Path;

use crate::config::{Config, RouterConfig, DEFAULT_API_PORT};

pub fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite it", path.display());
    }

    let mut config = Config::default();
    config.routers.push(RouterConfig {
        id: "kantor".to_string(),
        label: "Kantor".to_string(),
        host: "192.168.88.1".to_string(),
        port: DEFAULT_API_PORT,
        username: "admin".to_string(),
        password: String::new(),
    });
    config.save_to_file(path)?;

    println!("✅ Wrote {}", path.display());
    println!("   Fill in the [[routers]] entry, then run: mikrotik-billing test-connection kantor");
    Ok(())
}
