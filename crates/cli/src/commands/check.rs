//! Main check command: wires discovery, plugins and the local host together

use anyhow::{Context, Result};
use colored::Colorize;
use ruleplug::{Issue, LocalHost, RuleplugConfig, Summary};
use std::path::Path;
use std::time::Instant;

use crate::discovery::{discover_files, load_modules, Module};
use crate::output;
use crate::plugins::{self, Plugin};
use crate::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckExitCode {
    Success,
    IssuesExceedThreshold,
}

pub fn run(path: Option<&Path>, cli: &crate::Cli) -> Result<CheckExitCode> {
    let start = Instant::now();
    let root = path.unwrap_or_else(|| Path::new("."));
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("failed to resolve {}", root.display()))?;

    // ── 1. Config ────────────────────────────────────────────────
    let mut config = RuleplugConfig::find_and_load(&root)?;
    apply_cli_overrides(&mut config, cli);
    let format = resolve_format(cli, &config);

    if format == OutputFormat::Terminal {
        println!(
            "{}",
            format!("  ruleplug v{} — checking {}", ruleplug::VERSION, root.display()).bold()
        );
        println!();
    }

    // ── 2. File Discovery ────────────────────────────────────────
    let files = discover_files(&root, &config.ignore.paths, cli.recursive)?;
    let modules = load_modules(&files)?;
    log::debug!("{} file(s) in {} module(s)", files.len(), modules.len());

    // ── 3. Rulesets ──────────────────────────────────────────────
    let mut plugins = plugins::start_all(&config)?;
    let global = config.global_config();
    for plugin in &mut plugins {
        plugin.configure(&global)?;
    }

    // ── 4. Check ─────────────────────────────────────────────────
    let mut issues = Vec::new();
    for module in &modules {
        issues.extend(check_module(module, &root, &config, &mut plugins)?);
    }
    for plugin in plugins {
        plugin.shutdown()?;
    }

    // ── 5. Output ────────────────────────────────────────────────
    let summary = Summary::from_issues(&issues, files.len());
    match format {
        OutputFormat::Terminal => print_terminal(&issues, &summary, start),
        OutputFormat::Json => print_json(&issues, &summary),
    }

    if summary.exceeds_threshold(&config.general.fail_on) {
        Ok(CheckExitCode::IssuesExceedThreshold)
    } else {
        Ok(CheckExitCode::Success)
    }
}

/// Run every ruleset against one module. Issue filenames are made
/// relative to `root`; fixes are written back when enabled.
pub fn check_module(
    module: &Module,
    root: &Path,
    config: &RuleplugConfig,
    plugins: &mut [Plugin],
) -> Result<Vec<Issue>> {
    let rel_dir = module.dir.strip_prefix(root).unwrap_or(&module.dir);

    let mut host = LocalHost::new(module.files.clone())
        .with_context(|| format!("failed to load module {}", module.dir.display()))?
        .with_fix(config.general.fix)
        .with_originalwd(root.display().to_string());
    for name in config.rules.keys() {
        let Some(source) = config.rule_config_source(name) else {
            continue;
        };
        let source = source.with_context(|| format!("invalid settings for rule {:?}", name))?;
        if source.is_empty() {
            continue;
        }
        host = host
            .with_rule_config(name.clone(), &source)
            .with_context(|| format!("invalid settings for rule {:?}", name))?;
    }

    for plugin in plugins.iter_mut() {
        plugin.check(&mut host)?;
    }

    if config.general.fix {
        for (name, bytes) in host.changed_files() {
            let path = module.dir.join(&name);
            std::fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    let mut issues = host.take_issues();
    for issue in &mut issues {
        issue.range.filename = rel_dir
            .join(&issue.range.filename)
            .display()
            .to_string();
    }
    Ok(issues)
}

fn apply_cli_overrides(config: &mut RuleplugConfig, cli: &crate::Cli) {
    if cli.fix {
        config.general.fix = true;
    }
    if let Some(only) = &cli.only {
        config.general.only = only.clone();
    }
    if let Some(fail_on) = &cli.fail_on {
        config.general.fail_on = fail_on.clone();
    }
}

fn resolve_format(cli: &crate::Cli, config: &RuleplugConfig) -> OutputFormat {
    if let Some(f) = cli.format {
        return f;
    }
    match config.general.format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Terminal,
    }
}

fn print_terminal(issues: &[Issue], summary: &Summary, start: Instant) {
    if issues.is_empty() {
        println!("  {}", "No issues found.".green());
    }
    for issue in issues {
        println!("{}", output::terminal::format_issue(issue));
    }
    println!();
    println!("  {}", "\u{2500}".repeat(60).dimmed());
    println!("{}", output::terminal::format_summary(summary));
    println!("  Time: {:.1}s", start.elapsed().as_secs_f64());
}

fn print_json(issues: &[Issue], summary: &Summary) {
    let out = output::json::build_json_output(issues, summary);
    match serde_json::to_string_pretty(&out) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize JSON: {}", e),
    }
}
