use super::Rule;
use crate::error::{Error, Result};
use crate::eval::EvalContext;
use crate::fixer::Fixer;
use crate::hclext::{decode_body, implied_body_schema, BodyContent, BodySchema, Decode};
use crate::syntax::{Diagnostic, Diagnostics, Expression, File, Range};
use crate::value::{FromValue, Value};
use crate::wire::{EvaluateExprOption, GetModuleContentOption};
use std::collections::BTreeMap;

/// Analysis API available to rules during a check
pub trait Runner {
    /// Path of the inspected module from the root; empty for the root
    fn get_module_path(&mut self) -> Result<Vec<String>>;

    /// Working directory the host was started in
    fn get_originalwd(&mut self) -> Result<String>;

    fn get_module_content(
        &mut self,
        schema: &BodySchema,
        option: &GetModuleContentOption,
    ) -> Result<BodyContent>;

    /// `None` when the host has no such file
    fn get_file(&mut self, name: &str) -> Result<Option<File>>;

    fn get_files(&mut self) -> Result<BTreeMap<String, File>>;

    /// `None` when the rule has no configuration
    fn get_rule_config_content(
        &mut self,
        rule_name: &str,
        schema: &BodySchema,
    ) -> Result<Option<BodyContent>>;

    /// The evaluated value as the host returned it, marks included
    fn evaluate_expr_value(
        &mut self,
        expr: &Expression,
        option: &EvaluateExprOption,
    ) -> Result<Value>;

    fn emit_issue(&mut self, rule: &dyn Rule, message: &str, range: &Range) -> Result<()>;

    /// Report an issue together with a fix.
    ///
    /// `fix` edits a [`Fixer`]. If it returns [`Error::FixNotSupported`]
    /// the issue is reported as not fixable and its edits are dropped.
    /// Outside the root module fixes are never attempted.
    fn emit_issue_with_fix(
        &mut self,
        rule: &dyn Rule,
        message: &str,
        range: &Range,
        fix: &mut dyn FnMut(&mut Fixer) -> Result<()>,
    ) -> Result<()>;

    /// Send accepted fixes to the host
    fn apply_changes(&mut self) -> Result<()>;
}

/// Typed helpers on top of [`Runner`]
pub trait RunnerExt: Runner {
    /// Bodies of `resource "<resource_type>" "<name>"` blocks
    fn get_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        option: &GetModuleContentOption,
    ) -> Result<BodyContent> {
        let outer = BodySchema::new().block("resource", &["type", "name"], schema.clone());
        let mut option = option.clone();
        option.hint.resource_type = resource_type.to_string();
        let content = self.get_module_content(&outer, &option)?;
        Ok(filter_by_first_label(content, resource_type))
    }

    /// Bodies of `provider "<name>"` blocks
    fn get_provider_content(
        &mut self,
        name: &str,
        schema: &BodySchema,
        option: &GetModuleContentOption,
    ) -> Result<BodyContent> {
        let outer = BodySchema::new().block("provider", &["name"], schema.clone());
        let content = self.get_module_content(&outer, option)?;
        Ok(filter_by_first_label(content, name))
    }

    /// Bind the rule's configuration into `target`; a rule without
    /// configuration leaves it untouched
    fn decode_rule_config<T: Decode>(&mut self, rule_name: &str, target: &mut T) -> Result<()> {
        let schema = implied_body_schema::<T>();
        let Some(content) = self.get_rule_config_content(rule_name, &schema)? else {
            return Ok(());
        };
        let diags = decode_body(&content, &EvalContext::new(), target);
        if diags.has_errors() {
            return Err(diags.into());
        }
        Ok(())
    }

    /// Evaluate `expr` into `T`.
    ///
    /// Unless `T` can hold them, sensitive, ephemeral, unknown and null
    /// results come back as the matching sentinel error.
    fn evaluate_expr<T: FromValue>(
        &mut self,
        expr: &Expression,
        option: &EvaluateExprOption,
    ) -> Result<T> {
        let mut option = option.clone();
        if option.want_type.is_none() {
            option.want_type = Some(T::implied_type());
        }
        let value = self.evaluate_expr_value(expr, &option)?;
        decode_evaluated(value, expr)
    }

    /// Like [`RunnerExt::evaluate_expr`], handing the value to `callback`.
    /// The callback is not run on any error.
    fn evaluate_expr_with<T: FromValue>(
        &mut self,
        expr: &Expression,
        option: &EvaluateExprOption,
        callback: impl FnOnce(T) -> Result<()>,
    ) -> Result<()> {
        let value = self.evaluate_expr::<T>(expr, option)?;
        callback(value)
    }
}

impl<R: Runner + ?Sized> RunnerExt for R {}

fn filter_by_first_label(content: BodyContent, label: &str) -> BodyContent {
    BodyContent {
        attributes: BTreeMap::new(),
        blocks: content
            .blocks
            .into_iter()
            .filter(|b| b.labels.first().is_some_and(|l| l == label))
            .collect(),
        missing_item_range: content.missing_item_range,
    }
}

pub(crate) fn decode_evaluated<T: FromValue>(value: Value, expr: &Expression) -> Result<T> {
    if !T::accepts_marked() {
        let marks = value.deep_marks();
        if marks.sensitive {
            return Err(Error::SensitiveValue);
        }
        if marks.ephemeral {
            return Err(Error::EphemeralValue);
        }
        if !value.is_wholly_known() {
            return Err(Error::UnknownValue);
        }
        if value.is_null() {
            return Err(Error::NullValue);
        }
    }
    T::from_value(value).map_err(|e| {
        Diagnostics::from(
            Diagnostic::error("Unsuitable value type", format!("Unsuitable value: {}", e))
                .with_subject(expr.range().clone()),
        )
        .into()
    })
}
