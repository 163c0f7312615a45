//! Ruleplug SDK - building blocks for HCL lint plugins
//!
//! This crate provides everything a lint plugin and its host share:
//! - Schema-directed extraction of HCL/JSON bodies and typed decoding
//! - A text-edit fixer that keeps rewrites consistent across a check
//! - The host/plugin protocol, with a plugin runner and a host adapter

pub mod config;
pub mod error;
pub mod eval;
pub mod fixer;
pub mod format;
pub mod hclext;
pub mod host;
pub mod issue;
pub mod plugin;
pub mod syntax;
pub mod value;
pub mod wire;

pub use config::{GlobalConfig, RuleplugConfig};
pub use error::{ensure_no_error, Error, Result};
pub use eval::EvalContext;
pub use fixer::Fixer;
pub use hclext::{BodyContent, BodySchema, Decode};
pub use host::{LocalHost, RuleSetClient, Server};
pub use issue::{Issue, RuleIdentity, Severity, Summary};
pub use plugin::{BuiltinRuleSet, Rule, RuleSet, Runner, RunnerExt};
pub use syntax::{Diagnostic, Diagnostics, Expression, Pos, Range};
pub use value::{FromValue, Type, Value};

/// Ruleplug version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
