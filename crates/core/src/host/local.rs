//! In-memory host over one module's files

use super::Server;
use crate::config::RULE_CONFIG_FILENAME;
use crate::error::{Error, Result};
use crate::eval::EvalContext;
use crate::hclext::{self, BodyContent, BodySchema};
use crate::issue::Issue;
use crate::syntax::{parse_file, Diagnostics, Expression, File};
use crate::value::{Marks, Type, Value};
use crate::wire::{EvaluateExprOption, GetModuleContentOption, ModuleCtx};
use std::collections::{BTreeMap, BTreeSet};

/// A host that serves files it holds in memory.
///
/// Root variables come from `variable` blocks: the `default` attribute is
/// the value, a variable without one is unknown, and `sensitive` or
/// `ephemeral` mark it. `locals` blocks are evaluated against those
/// variables. Fixes are applied to the held files when fixing is enabled.
#[derive(Debug)]
pub struct LocalHost {
    files: BTreeMap<String, File>,
    variables: BTreeMap<String, Value>,
    locals: Vec<hclext::Attribute>,
    rule_configs: BTreeMap<String, File>,
    module_path: Vec<String>,
    originalwd: String,
    fix: bool,
    issues: Vec<Issue>,
    changed: BTreeSet<String>,
}

impl LocalHost {
    pub fn new(files: BTreeMap<String, Vec<u8>>) -> Result<Self, Diagnostics> {
        let mut diags = Diagnostics::new();
        let mut parsed = BTreeMap::new();
        for (name, bytes) in files {
            match parse_file(&bytes, &name) {
                Ok(file) => {
                    parsed.insert(name, file);
                }
                Err(d) => diags.extend(d),
            }
        }
        if diags.has_errors() {
            return Err(diags);
        }

        let mut host = Self {
            files: parsed,
            variables: BTreeMap::new(),
            locals: Vec::new(),
            rule_configs: BTreeMap::new(),
            module_path: Vec::new(),
            originalwd: ".".to_string(),
            fix: false,
            issues: Vec::new(),
            changed: BTreeSet::new(),
        };
        host.variables = host.declared_variables()?;
        host.locals = host.declared_locals()?;
        log::debug!(
            "local host: {} file(s), {} variable(s), {} local(s)",
            host.files.len(),
            host.variables.len(),
            host.locals.len()
        );
        Ok(host)
    }

    /// Override a variable's value, as a `-var` flag would
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Attach configuration for one rule, written as the body of its
    /// `rule` block
    pub fn with_rule_config(mut self, name: impl Into<String>, body: &str) -> Result<Self, Diagnostics> {
        let file = parse_file(body.as_bytes(), RULE_CONFIG_FILENAME)?;
        self.rule_configs.insert(name.into(), file);
        Ok(self)
    }

    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_module_path(mut self, path: Vec<String>) -> Self {
        self.module_path = path;
        self
    }

    pub fn with_originalwd(mut self, dir: impl Into<String>) -> Self {
        self.originalwd = dir.into();
        self
    }

    /// Issues emitted so far, in emission order
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }

    /// Current bytes of every file a fix has rewritten
    pub fn changed_files(&self) -> BTreeMap<String, Vec<u8>> {
        self.changed
            .iter()
            .filter_map(|name| self.files.get(name).map(|f| (name.clone(), f.bytes().to_vec())))
            .collect()
    }

    fn merged_content(&self, schema: &BodySchema) -> Result<BodyContent, Diagnostics> {
        let mut merged = BodyContent::default();
        let mut diags = Diagnostics::new();
        for file in self.files.values() {
            let (content, d) = hclext::partial_content(Some(file.body()), Some(schema));
            diags.extend(d);
            if merged.missing_item_range.is_none() {
                merged.missing_item_range = content.missing_item_range;
            }
            merged.attributes.extend(content.attributes);
            merged.blocks.extend(content.blocks);
        }
        if diags.has_errors() {
            return Err(diags);
        }
        Ok(merged)
    }

    fn declared_variables(&self) -> Result<BTreeMap<String, Value>, Diagnostics> {
        let schema = BodySchema::new().block(
            "variable",
            &["name"],
            BodySchema::new()
                .attribute("default")
                .attribute("type")
                .attribute("description")
                .attribute("sensitive")
                .attribute("ephemeral")
                .attribute("nullable"),
        );
        let content = self.merged_content(&schema)?;
        let empty = EvalContext::new();
        let mut variables = BTreeMap::new();
        for block in content.blocks_of_type("variable") {
            let Some(name) = block.labels.first() else {
                continue;
            };
            let value = match block.body.attributes.get("default") {
                Some(attr) => empty.evaluate(&attr.expr)?,
                None => Value::Unknown,
            };
            let mut marks = Marks::default();
            if flag(&empty, &block.body, "sensitive")? {
                marks = marks.union(Marks::SENSITIVE);
            }
            if flag(&empty, &block.body, "ephemeral")? {
                marks = marks.union(Marks::EPHEMERAL);
            }
            variables.insert(name.clone(), value.mark(marks));
        }
        Ok(variables)
    }

    fn declared_locals(&self) -> Result<Vec<hclext::Attribute>, Diagnostics> {
        let schema = BodySchema::new().block("locals", &[], BodySchema::just_attributes());
        let content = self.merged_content(&schema)?;
        Ok(content
            .blocks_of_type("locals")
            .flat_map(|b| b.body.attributes.values().cloned())
            .collect())
    }

    fn eval_context(&self) -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.declare("var", Value::Map(self.variables.clone()));

        // Locals may refer to each other; settle them over repeated passes.
        // Anything still failing is left unknown.
        let mut values = BTreeMap::new();
        for _ in 0..=self.locals.len() {
            let mut next = BTreeMap::new();
            for local in &self.locals {
                let value = ctx.evaluate(&local.expr).unwrap_or(Value::Unknown);
                next.insert(local.name.clone(), value);
            }
            let settled = next == values;
            values = next;
            ctx.declare("local", Value::Map(values.clone()));
            if settled {
                break;
            }
        }
        ctx
    }
}

fn flag(ctx: &EvalContext, body: &BodyContent, name: &str) -> Result<bool, Diagnostics> {
    match body.attributes.get(name) {
        Some(attr) => Ok(ctx.evaluate_as(&attr.expr, &Type::Bool)? == Value::Bool(true)),
        None => Ok(false),
    }
}

impl Server for LocalHost {
    fn get_module_path(&self) -> Result<Vec<String>> {
        Ok(self.module_path.clone())
    }

    fn get_originalwd(&self) -> Result<String> {
        Ok(self.originalwd.clone())
    }

    fn get_module_content(
        &self,
        schema: &BodySchema,
        _option: &GetModuleContentOption,
    ) -> Result<BodyContent> {
        Ok(self.merged_content(schema)?)
    }

    fn get_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(name).map(|f| f.bytes().to_vec()))
    }

    /// The held module is both the inspected module and the root
    fn get_files(&self, _module_ctx: ModuleCtx) -> Result<BTreeMap<String, Vec<u8>>> {
        Ok(self
            .files
            .iter()
            .map(|(name, f)| (name.clone(), f.bytes().to_vec()))
            .collect())
    }

    fn get_rule_config_content(
        &self,
        name: &str,
        schema: &BodySchema,
    ) -> Result<Option<(BodyContent, BTreeMap<String, Vec<u8>>)>> {
        let Some(file) = self.rule_configs.get(name) else {
            return Ok(None);
        };
        let (content, diags) = hclext::content(Some(file.body()), Some(schema));
        if diags.has_errors() {
            return Err(Error::Diagnostics(diags));
        }
        let sources = BTreeMap::from([(RULE_CONFIG_FILENAME.to_string(), file.bytes().to_vec())]);
        Ok(Some((content, sources)))
    }

    fn evaluate_expr(&self, expr: &Expression, option: &EvaluateExprOption) -> Result<Value> {
        let ctx = self.eval_context();
        let value = match &option.want_type {
            Some(ty) => ctx.evaluate_as(expr, ty)?,
            None => ctx.evaluate(expr)?,
        };
        Ok(value)
    }

    fn emit_issue(&mut self, mut issue: Issue) -> Result<bool> {
        let applied = self.fix && issue.fixable;
        issue.fixed = applied;
        log::debug!("{}: {} ({})", issue.range, issue.message, issue.rule.name);
        self.issues.push(issue);
        Ok(applied)
    }

    fn apply_changes(&mut self, changes: BTreeMap<String, Vec<u8>>) -> Result<()> {
        for (name, bytes) in changes {
            if !self.files.contains_key(&name) {
                return Err(Error::FileNotFound(name));
            }
            let file = parse_file(&bytes, &name)?;
            log::info!("fixed {}", name);
            self.files.insert(name.clone(), file);
            self.changed.insert(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{RuleIdentity, Severity};
    use crate::syntax::{Pos, Range};

    fn host(files: &[(&str, &str)]) -> LocalHost {
        LocalHost::new(
            files
                .iter()
                .map(|(n, s)| (n.to_string(), s.as_bytes().to_vec()))
                .collect(),
        )
        .unwrap()
    }

    fn eval(host: &LocalHost, src: &str) -> Value {
        let expr = Expression::parse(src.as_bytes(), "main.tf", Pos::START).unwrap();
        host.evaluate_expr(&expr, &EvaluateExprOption::default()).unwrap()
    }

    #[test]
    fn test_variables_and_locals() {
        let host = host(&[
            ("main.tf", "variable \"name\" {\n  default = \"web\"\n}\n"),
            ("locals.tf", "locals {\n  full = \"${local.prefix}-${var.name}\"\n  prefix = \"app\"\n}\n"),
        ]);
        assert_eq!(eval(&host, "var.name"), Value::from("web"));
        assert_eq!(eval(&host, "local.full"), Value::from("app-web"));
    }

    #[test]
    fn test_marked_and_unknown_variables() {
        let host = host(&[(
            "main.tf",
            "variable \"secret\" {\n  default = \"x\"\n  sensitive = true\n}\nvariable \"later\" {}\n",
        )]);
        assert_eq!(eval(&host, "var.secret").marks(), Marks::SENSITIVE);
        assert!(!eval(&host, "var.later").is_known());

        let host = host.with_variable("later", Value::from(3i64));
        assert_eq!(eval(&host, "var.later"), Value::from(3i64));
    }

    #[test]
    fn test_want_type_converts() {
        let host = host(&[("main.tf", "variable \"n\" {\n  default = 1\n}\n")]);
        let expr = Expression::parse(b"var.n", "main.tf", Pos::START).unwrap();
        let option = EvaluateExprOption {
            want_type: Some(Type::String),
            ..Default::default()
        };
        assert_eq!(host.evaluate_expr(&expr, &option).unwrap(), Value::from("1"));
    }

    #[test]
    fn test_module_content_merges_files() {
        let host = host(&[
            ("b.tf", "resource \"aws_instance\" \"b\" {}\n"),
            ("a.tf", "resource \"aws_instance\" \"a\" {}\nprovider \"aws\" {}\n"),
        ]);
        let schema = BodySchema::new().block("resource", &["type", "name"], BodySchema::new());
        let content = host
            .get_module_content(&schema, &GetModuleContentOption::default())
            .unwrap();
        let names: Vec<_> = content.blocks.iter().map(|b| b.labels[1].as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_rule_config() {
        let host = host(&[("main.tf", "")])
            .with_rule_config("my_rule", "style = \"flexible\"\n")
            .unwrap();
        let schema = BodySchema::new().attribute("style");
        let (content, sources) = host.get_rule_config_content("my_rule", &schema).unwrap().unwrap();
        assert!(content.attributes.contains_key("style"));
        assert!(sources.contains_key(RULE_CONFIG_FILENAME));
        assert!(host.get_rule_config_content("other", &schema).unwrap().is_none());

        let strict = BodySchema::new();
        assert!(host.get_rule_config_content("my_rule", &strict).is_err());
    }

    #[test]
    fn test_issues_and_changes() {
        let mut host = host(&[("main.tf", "locals {}\n")]).with_fix(true);
        let issue = |fixable| Issue {
            rule: RuleIdentity {
                name: "r".to_string(),
                enabled: true,
                severity: Severity::Warning,
                link: String::new(),
            },
            message: "m".to_string(),
            range: Range::at("main.tf", Pos::START),
            fixable,
            fixed: false,
        };
        assert!(host.emit_issue(issue(true)).unwrap());
        assert!(!host.emit_issue(issue(false)).unwrap());
        assert!(host.issues()[0].fixed);

        host.apply_changes(BTreeMap::from([("main.tf".to_string(), b"".to_vec())]))
            .unwrap();
        assert_eq!(host.changed_files()["main.tf"], b"");
        let err = host
            .apply_changes(BTreeMap::from([("new.tf".to_string(), Vec::new())]))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
