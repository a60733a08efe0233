use anyhow::Context;
use pna_core::config::{Config, DriverConfig};
use pna_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path, bridge: Option<&str>) -> anyhow::Result<()> {
    println!("Initializing cell in: {}", root.display());

    let pna_dir = paths::pna_dir(root);
    io::ensure_dir(&pna_dir).with_context(|| format!("failed to create {}", pna_dir.display()))?;

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root)?
    } else {
        let mut cfg = Config::default();
        if let Some(url) = bridge {
            cfg.driver = DriverConfig::Http {
                base_url: url.to_string(),
                timeout_secs: 30,
            };
        }
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let macros = config.macros_path(root);
    if macros.is_dir() {
        println!("  exists:  {}", config.macros_dir.display());
    } else {
        io::ensure_dir(&macros)
            .with_context(|| format!("failed to create {}", macros.display()))?;
        println!("  created: {}", config.macros_dir.display());
    }

    for w in config.validate() {
        println!("  {:?}: {}", w.level, w.message);
    }
    Ok(())
}
