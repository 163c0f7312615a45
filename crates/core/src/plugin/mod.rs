//! Plugin side of the protocol
//!
//! A plugin is a [`RuleSet`] handed to [`serve`]. During a check each
//! [`Rule`] talks to the host through a [`Runner`].

mod client;
mod runner;
mod server;

pub use client::Client;
pub use runner::{Runner, RunnerExt};
pub use server::{serve, serve_stdio};

use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::hclext::{BodyContent, BodySchema};
use crate::issue::{RuleIdentity, Severity};

/// SDK version reported to hosts
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the rule runs when nothing in the configuration says otherwise
    fn enabled(&self) -> bool;

    fn severity(&self) -> Severity;

    /// Documentation URL
    fn link(&self) -> &str {
        ""
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()>;
}

pub(crate) fn rule_identity(rule: &dyn Rule) -> RuleIdentity {
    RuleIdentity {
        name: rule.name().to_string(),
        enabled: rule.enabled(),
        severity: rule.severity(),
        link: rule.link().to_string(),
    }
}

/// What a plugin serves to the host
pub trait RuleSet: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Host versions this ruleset works with; empty accepts any
    fn version_constraint(&self) -> &str {
        ""
    }

    fn rule_names(&self) -> Vec<String>;

    /// Schema of the ruleset's own configuration block
    fn config_schema(&self) -> BodySchema {
        BodySchema::default()
    }

    fn apply_global_config(&mut self, config: &GlobalConfig) -> Result<()>;

    fn apply_config(&mut self, content: &BodyContent) -> Result<()>;

    fn check(&self, runner: &mut dyn Runner) -> Result<()>;
}

/// A ruleset made of a fixed list of rules.
///
/// Fixes produced by a rule are sent to the host right after that rule
/// finishes, so the next rule sees the fixed sources.
pub struct BuiltinRuleSet {
    name: String,
    version: String,
    constraint: String,
    rules: Vec<Box<dyn Rule>>,
    enabled: Vec<bool>,
}

impl BuiltinRuleSet {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        rules: Vec<Box<dyn Rule>>,
    ) -> Self {
        let enabled = rules.iter().map(|r| r.enabled()).collect();
        Self {
            name: name.into(),
            version: version.into(),
            constraint: String::new(),
            rules,
            enabled,
        }
    }

    pub fn with_version_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules
            .iter()
            .zip(&self.enabled)
            .filter(|(_, on)| **on)
            .map(|(rule, _)| rule.as_ref())
    }
}

impl RuleSet for BuiltinRuleSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn version_constraint(&self) -> &str {
        &self.constraint
    }

    fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_string()).collect()
    }

    fn apply_global_config(&mut self, config: &GlobalConfig) -> Result<()> {
        self.enabled = self
            .rules
            .iter()
            .map(|r| config.is_rule_enabled(r.name(), r.enabled()))
            .collect();
        Ok(())
    }

    fn apply_config(&mut self, _content: &BodyContent) -> Result<()> {
        Ok(())
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        for rule in self.enabled_rules() {
            log::debug!("running rule {}", rule.name());
            rule.check(runner).map_err(|e| Error::RuleCheck {
                rule: rule.name().to_string(),
                source: Box::new(e),
            })?;
            runner.apply_changes().map_err(|e| Error::ApplyFixes {
                rule: rule.name().to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}
