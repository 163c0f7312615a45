//! Rule selection settings and the `.ruleplug.toml` driver configuration

use crate::fixer::{is_identifier, value_text};
use crate::value::Value;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the driver configuration file
pub const CONFIG_FILENAME: &str = ".ruleplug.toml";

/// File name under which rendered rule settings are served to plugins
pub const RULE_CONFIG_FILENAME: &str = ".ruleplug.hcl";

/// Rule selection sent to every ruleset before it is checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub rules: BTreeMap<String, RuleConfig>,
    pub disabled_by_default: bool,
    /// When non-empty, only these rules run
    pub only: Vec<String>,
    pub fix: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub enabled: bool,
}

impl GlobalConfig {
    /// Whether a rule should run, given its own default.
    ///
    /// The `only` list wins; then an explicit per-rule setting; then
    /// `disabled_by_default`.
    pub fn is_rule_enabled(&self, name: &str, default: bool) -> bool {
        if !self.only.is_empty() {
            return self.only.iter().any(|n| n == name);
        }
        if let Some(rule) = self.rules.get(name) {
            return rule.enabled;
        }
        if self.disabled_by_default {
            return false;
        }
        default
    }
}

/// Main configuration structure for .ruleplug.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleplugConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    /// External plugin binaries
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,

    /// Per-rule settings, keyed by rule name
    #[serde(default, rename = "rule")]
    pub rules: BTreeMap<String, RuleSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write fixes back to the source files
    #[serde(default)]
    pub fix: bool,

    #[serde(default)]
    pub disabled_by_default: bool,

    #[serde(default)]
    pub only: Vec<String>,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: String,

    /// Severity threshold for non-zero exit code
    #[serde(default = "default_fail_on")]
    pub fail_on: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Paths to ignore
    #[serde(default = "default_ignore_paths")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// `[rule.<name>]` table: `enabled` plus free-form rule attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(flatten)]
    pub attributes: BTreeMap<String, toml::Value>,
}

// Default functions
fn default_format() -> String {
    "terminal".to_string()
}

fn default_fail_on() -> String {
    "error".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ignore_paths() -> Vec<String> {
    vec![".terraform/".to_string(), ".git/".to_string()]
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            fix: false,
            disabled_by_default: false,
            only: Vec::new(),
            format: default_format(),
            fail_on: default_fail_on(),
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            paths: default_ignore_paths(),
        }
    }
}

impl RuleplugConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RuleplugConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Find and load .ruleplug.toml from the current directory or ancestors
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut current = start_dir;

        loop {
            let config_path = current.join(CONFIG_FILENAME);
            if config_path.exists() {
                log::debug!("loading {}", config_path.display());
                return Self::from_file(&config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // No config found, use defaults
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Rule selection for the wire; rules without an explicit `enabled`
    /// are left to their defaults
    pub fn global_config(&self) -> GlobalConfig {
        GlobalConfig {
            rules: self
                .rules
                .iter()
                .filter_map(|(name, settings)| {
                    settings.enabled.map(|enabled| {
                        (
                            name.clone(),
                            RuleConfig {
                                name: name.clone(),
                                enabled,
                            },
                        )
                    })
                })
                .collect(),
            disabled_by_default: self.general.disabled_by_default,
            only: self.general.only.clone(),
            fix: self.general.fix,
        }
    }

    /// Render the attributes of `[rule.<name>]` as a native-syntax body.
    ///
    /// Returns `None` when the rule has no table at all.
    pub fn rule_config_source(&self, name: &str) -> Option<Result<String>> {
        let settings = self.rules.get(name)?;
        Some(render_attributes(&settings.attributes))
    }
}

fn render_attributes(attributes: &BTreeMap<String, toml::Value>) -> Result<String> {
    let mut out = String::new();
    for (key, value) in attributes {
        if !is_identifier(key) {
            bail!("invalid rule attribute name {:?}", key);
        }
        let text = value_text(&Value::from(value.clone()))?;
        out.push_str(&format!("{} = {}\n", key, text));
    }
    Ok(out)
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::from(i),
            toml::Value::Float(f) => Value::from(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::String(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
