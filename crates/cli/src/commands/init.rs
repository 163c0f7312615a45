//! Initialize .ruleplug.toml configuration

use anyhow::Result;
use ruleplug::config::CONFIG_FILENAME;
use ruleplug::RuleplugConfig;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let target_path = path.unwrap_or_else(|| Path::new("."));
    let config_path = target_path.join(CONFIG_FILENAME);

    if config_path.exists() {
        println!("⚠️  {} already exists at {:?}", CONFIG_FILENAME, config_path);
        return Ok(());
    }

    let config = RuleplugConfig::default();
    config.save(&config_path)?;

    println!("✅ Created {} at {:?}", CONFIG_FILENAME, config_path);
    println!("\nYou can now customize the configuration and run:");
    println!("  ruleplug");

    Ok(())
}
