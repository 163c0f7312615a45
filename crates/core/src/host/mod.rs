//! Host side of the protocol
//!
//! A host implements [`Server`]; [`RuleSetClient`] drives a plugin and
//! answers its callbacks through [`handle`]. [`LocalHost`] is a complete
//! in-memory host over a set of files.

mod adapter;
mod local;
mod plugin_client;
pub mod version;

pub use adapter::handle;
pub use local::LocalHost;
pub use plugin_client::RuleSetClient;

use crate::error::Result;
use crate::hclext::{BodyContent, BodySchema};
use crate::issue::Issue;
use crate::syntax::Expression;
use crate::value::Value;
use crate::wire::{EvaluateExprOption, GetModuleContentOption, ModuleCtx};
use std::collections::BTreeMap;

/// Host version checked against plugin version constraints
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What a host provides to plugins during a check
pub trait Server {
    fn get_module_path(&self) -> Result<Vec<String>>;

    fn get_originalwd(&self) -> Result<String>;

    /// Errors in the returned diagnostics fail the call
    fn get_module_content(
        &self,
        schema: &BodySchema,
        option: &GetModuleContentOption,
    ) -> Result<BodyContent>;

    fn get_file(&self, name: &str) -> Result<Option<Vec<u8>>>;

    fn get_files(&self, module_ctx: ModuleCtx) -> Result<BTreeMap<String, Vec<u8>>>;

    /// Content of the rule's configuration and the sources it was read from
    fn get_rule_config_content(
        &self,
        name: &str,
        schema: &BodySchema,
    ) -> Result<Option<(BodyContent, BTreeMap<String, Vec<u8>>)>>;

    fn evaluate_expr(&self, expr: &Expression, option: &EvaluateExprOption) -> Result<Value>;

    /// Record an issue; returns whether its fix should be applied
    fn emit_issue(&mut self, issue: Issue) -> Result<bool>;

    fn apply_changes(&mut self, changes: BTreeMap<String, Vec<u8>>) -> Result<()>;
}
