//! Expression evaluation against declared root variables
//!
//! Evaluation itself is delegated to `hcl-rs`. Unknown values and marks
//! are not something that evaluator models, so both are tracked here from
//! the expression's references: a reference to an unknown value makes the
//! whole result unknown, and the marks of every referenced value are
//! carried over to the result.

use crate::syntax::{Diagnostic, Diagnostics, Expression};
use crate::value::{Marks, Type, Value};
use hcl::eval::{Evaluate, FuncArgs, FuncDef, ParamType};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    roots: BTreeMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a root variable such as `var` or `local`
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.roots.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.roots.get(name)
    }

    pub fn evaluate(&self, expr: &Expression) -> Result<Value, Diagnostics> {
        let mut marks = Marks::default();
        let mut unknown = false;
        for reference in expr.references() {
            let Some(root) = self.roots.get(&reference.root) else {
                continue;
            };
            let target = match &reference.attr {
                Some(attr) => root.get_attr(attr),
                None => Some(root.clone()),
            };
            if let Some(value) = target {
                marks = marks.union(value.deep_marks());
                unknown |= !value.is_wholly_known();
            }
        }
        if unknown {
            return Ok(Value::Unknown.mark(marks));
        }

        let mut ctx = hcl::eval::Context::new();
        declare_functions(&mut ctx);
        for (name, value) in &self.roots {
            ctx.declare_var(name.as_str(), value.to_hcl());
        }
        let evaluated = expr.to_hcl().evaluate(&ctx).map_err(|e| {
            Diagnostics::from(
                Diagnostic::error("Failed to evaluate expression", e.to_string())
                    .with_subject(expr.range().clone()),
            )
        })?;
        Ok(Value::from(evaluated).mark(marks))
    }

    /// Evaluate and convert to `ty`
    pub fn evaluate_as(&self, expr: &Expression, ty: &Type) -> Result<Value, Diagnostics> {
        let value = self.evaluate(expr)?;
        ty.convert(value).map_err(|e| {
            Diagnostics::from(
                Diagnostic::error(
                    "Unsuitable value type",
                    format!("Unsuitable value: {}", e),
                )
                .with_subject(expr.range().clone()),
            )
        })
    }
}

fn declare_functions(ctx: &mut hcl::eval::Context) {
    ctx.declare_func("upper", FuncDef::builder().param(ParamType::String).build(upper));
    ctx.declare_func("lower", FuncDef::builder().param(ParamType::String).build(lower));
    ctx.declare_func("length", FuncDef::builder().param(ParamType::Any).build(length));
}

fn upper(args: FuncArgs) -> Result<hcl::Value, String> {
    let s = args[0].as_str().ok_or("upper: string required")?;
    Ok(hcl::Value::String(s.to_uppercase()))
}

fn lower(args: FuncArgs) -> Result<hcl::Value, String> {
    let s = args[0].as_str().ok_or("lower: string required")?;
    Ok(hcl::Value::String(s.to_lowercase()))
}

fn length(args: FuncArgs) -> Result<hcl::Value, String> {
    let len = match &args[0] {
        hcl::Value::String(s) => s.chars().count(),
        hcl::Value::Array(items) => items.len(),
        hcl::Value::Object(map) => map.len(),
        _ => return Err("length: string, list or map required".to_string()),
    };
    Ok(hcl::Value::from(len as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Pos;

    fn expr(src: &str) -> Expression {
        Expression::parse(src.as_bytes(), "main.tf", Pos::START).unwrap()
    }

    fn vars(entries: &[(&str, Value)]) -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.declare(
            "var",
            Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ),
        );
        ctx
    }

    #[test]
    fn test_evaluate_literal_and_template() {
        let ctx = vars(&[("name", Value::from("web"))]);
        assert_eq!(ctx.evaluate(&expr("1 + 2")).unwrap(), Value::from(3i64));
        assert_eq!(
            ctx.evaluate(&expr("\"${var.name}-1\"")).unwrap(),
            Value::from("web-1")
        );
    }

    #[test]
    fn test_heredoc_keeps_trailing_newline() {
        let ctx = EvalContext::new();
        assert_eq!(
            ctx.evaluate(&expr("<<EOT\nhello\nEOT")).unwrap(),
            Value::from("hello\n")
        );
    }

    #[test]
    fn test_unknown_reference_makes_result_unknown() {
        let ctx = vars(&[("id", Value::Unknown)]);
        assert_eq!(ctx.evaluate(&expr("\"x-${var.id}\"")).unwrap(), Value::Unknown);
    }

    #[test]
    fn test_marks_propagate() {
        let ctx = vars(&[("secret", Value::from("pw").mark(Marks::SENSITIVE))]);
        let v = ctx.evaluate(&expr("upper(var.secret)")).unwrap();
        assert_eq!(v.marks(), Marks::SENSITIVE);
    }

    #[test]
    fn test_builtin_functions() {
        let ctx = vars(&[("tags", Value::from(vec!["a", "b"]))]);
        assert_eq!(ctx.evaluate(&expr("length(var.tags)")).unwrap(), Value::from(2i64));
        assert_eq!(ctx.evaluate(&expr("lower(\"AbC\")")).unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_evaluation_failure_is_diagnostic() {
        let ctx = EvalContext::new();
        let err = ctx.evaluate(&expr("var.missing")).unwrap_err();
        assert_eq!(err[0].summary, "Failed to evaluate expression");
    }

    #[test]
    fn test_evaluate_as_converts() {
        let ctx = EvalContext::new();
        let v = ctx.evaluate_as(&expr("\"3\""), &Type::Number).unwrap();
        assert_eq!(v, Value::from(3i64));
    }
}
