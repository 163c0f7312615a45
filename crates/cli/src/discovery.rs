//! Configuration file discovery with gitignore-aware filtering
//!
//! Uses the `ignore` crate (from ripgrep) to respect `.gitignore`,
//! `.ignore` and `.git/info/exclude`. Every directory holding
//! configuration files is one module.

use anyhow::{Context, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration files of one module, keyed by file name
#[derive(Debug, Clone)]
pub struct Module {
    pub dir: PathBuf,
    pub files: BTreeMap<String, Vec<u8>>,
}

/// Discover configuration files under `root`, skipping paths that match
/// `ignore_patterns`. Without `recursive` only `root` itself is searched.
///
/// Returns absolute paths sorted alphabetically.
pub fn discover_files(
    root: &Path,
    ignore_patterns: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let root = root.canonicalize()?;

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);
    if !recursive {
        builder.max_depth(Some(1));
    }

    // Overrides use gitignore syntax; negated patterns act as excludes
    if !ignore_patterns.is_empty() {
        let mut overrides = OverrideBuilder::new(&root);
        for pattern in ignore_patterns {
            let glob = if pattern.ends_with('/') {
                format!("!{}**", pattern)
            } else {
                format!("!{}", pattern)
            };
            overrides.add(&glob)?;
        }
        builder.overrides(overrides.build()?);
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.into_path();
        if is_config_file(&path) {
            if path.is_absolute() {
                files.push(path);
            } else {
                files.push(root.join(path));
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Group files by directory and read them in parallel
pub fn load_modules(files: &[PathBuf]) -> Result<Vec<Module>> {
    let read: Vec<(PathBuf, String, Vec<u8>)> = files
        .par_iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((dir, name, bytes))
        })
        .collect::<Result<_>>()?;

    let mut modules: BTreeMap<PathBuf, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    for (dir, name, bytes) in read {
        modules.entry(dir).or_default().insert(name, bytes);
    }
    Ok(modules
        .into_iter()
        .map(|(dir, files)| Module { dir, files })
        .collect())
}

const CONFIG_SUFFIXES: &[&str] = &[".tf", ".tf.json"];

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| CONFIG_SUFFIXES.iter().any(|s| name.ends_with(s)))
}
