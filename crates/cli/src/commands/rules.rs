//! List rules and whether they run

use anyhow::Result;
use colored::Colorize;
use ruleplug::RuleplugConfig;
use std::path::Path;

use crate::plugins;

pub fn run(path: Option<&Path>, cli: &crate::Cli) -> Result<()> {
    let dir = path.unwrap_or_else(|| Path::new("."));
    let mut config = RuleplugConfig::find_and_load(dir)?;
    if let Some(only) = &cli.only {
        config.general.only = only.clone();
    }
    let global = config.global_config();

    for mut plugin in plugins::start_all(&config)? {
        println!("{}", format!("  {} {}", plugin.name, plugin.version).bold());
        for name in plugin.rule_names()? {
            // Rule defaults live in the plugin; only explicit selection is known here
            let state = if !global.only.is_empty() && !global.only.contains(&name) {
                "disabled".dimmed()
            } else {
                match global.rules.get(&name) {
                    Some(rule) if !rule.enabled => "disabled".dimmed(),
                    Some(_) => "enabled".green(),
                    None if global.disabled_by_default => "disabled".dimmed(),
                    None => "default".normal(),
                }
            };
            println!("    {:<40} {}", name, state);
        }
        plugin.shutdown()?;
    }
    Ok(())
}
