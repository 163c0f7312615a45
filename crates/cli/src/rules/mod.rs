//! Rules shipped with the driver
//!
//! They are served like any external ruleset, from a thread inside the
//! driver process or from `ruleplug plugin` over stdio.

mod allowed_values;
mod comment_syntax;
mod empty_locals;
mod variable_type;

pub use allowed_values::ResourceAllowedValues;
pub use comment_syntax::TerraformCommentSyntax;
pub use empty_locals::TerraformEmptyLocals;
pub use variable_type::TerraformVariableType;

use ruleplug::BuiltinRuleSet;

pub const RULESET_NAME: &str = "builtin";

pub fn builtin_ruleset() -> BuiltinRuleSet {
    BuiltinRuleSet::new(
        RULESET_NAME,
        ruleplug::VERSION,
        vec![
            Box::new(TerraformCommentSyntax),
            Box::new(TerraformEmptyLocals),
            Box::new(TerraformVariableType),
            Box::new(ResourceAllowedValues),
        ],
    )
}
