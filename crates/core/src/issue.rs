//! Issue types that bridge rule results to the host and its output formatters

use crate::syntax::Range;
use serde::{Deserialize, Serialize};

/// Severity level of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Notice,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Notice => write!(f, "notice"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "notice" | "info" => Ok(Severity::Notice),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Identity of the rule an issue came from, sent by value across the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleIdentity {
    pub name: String,
    pub enabled: bool,
    pub severity: Severity,
    /// Documentation URL, empty when the rule has none
    #[serde(default)]
    pub link: String,
}

/// A single issue reported by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub rule: RuleIdentity,

    /// Human-readable message
    pub message: String,

    /// Where the problem is
    pub range: Range,

    /// Whether the plugin produced a fix for it
    #[serde(default)]
    pub fixable: bool,

    /// Whether the fix was written back
    #[serde(default)]
    pub fixed: bool,
}

/// Counts over a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub notices: usize,
    pub fixed: usize,
    pub files_analyzed: usize,
}

impl Summary {
    pub fn from_issues(issues: &[Issue], files_analyzed: usize) -> Self {
        let mut summary = Summary {
            files_analyzed,
            ..Summary::default()
        };
        for issue in issues {
            if issue.fixed {
                summary.fixed += 1;
                continue;
            }
            match issue.rule.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Notice => summary.notices += 1,
            }
        }
        summary
    }

    /// Check whether issues exceed the configured severity threshold.
    ///
    /// - `"error"` → fail if errors > 0
    /// - `"warning"` → fail if errors or warnings > 0
    /// - `"notice"` → fail if any issues
    /// - `"never"` → always pass
    pub fn exceeds_threshold(&self, fail_on: &str) -> bool {
        match fail_on {
            "error" => self.errors > 0,
            "warning" => self.errors > 0 || self.warnings > 0,
            "notice" => self.errors > 0 || self.warnings > 0 || self.notices > 0,
            "never" => false,
            _ => self.errors > 0, // default to "error" for unknown values
        }
    }
}
