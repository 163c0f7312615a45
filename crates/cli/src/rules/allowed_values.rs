use ruleplug::wire::{EvaluateExprOption, GetModuleContentOption};
use ruleplug::{ensure_no_error, impl_decode, BodySchema, Result, Rule, Runner, RunnerExt, Severity};

#[derive(Debug, Default)]
struct AllowedValuesConfig {
    resource: String,
    attribute: String,
    values: Vec<String>,
}

impl_decode!(AllowedValuesConfig {
    resource => attr("resource"),
    attribute => attr("attribute"),
    values => attr("values"),
});

/// Restricts one resource attribute to a configured set of values.
///
/// Does nothing until configured:
///
/// ```toml
/// [rule.resource_allowed_values]
/// resource = "aws_instance"
/// attribute = "instance_type"
/// values = ["t3.micro", "t3.small"]
/// ```
pub struct ResourceAllowedValues;

impl Rule for ResourceAllowedValues {
    fn name(&self) -> &str {
        "resource_allowed_values"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let mut config = AllowedValuesConfig::default();
        runner.decode_rule_config(self.name(), &mut config)?;
        if config.resource.is_empty() {
            return Ok(());
        }

        let schema = BodySchema::new().attribute(config.attribute.clone());
        let content = runner.get_resource_content(
            &config.resource,
            &schema,
            &GetModuleContentOption::default(),
        )?;
        for block in &content.blocks {
            let Some(attr) = block.body.attributes.get(&config.attribute) else {
                continue;
            };
            let value = runner.evaluate_expr::<String>(&attr.expr, &EvaluateExprOption::default());
            ensure_no_error(value, |value| {
                if config.values.contains(&value) {
                    return Ok(());
                }
                runner.emit_issue(
                    self,
                    &format!(
                        "\"{}\" is not an allowed value for {}.{} (allowed: {})",
                        value,
                        config.resource,
                        config.attribute,
                        config.values.join(", ")
                    ),
                    attr.expr.range(),
                )
            })?;
        }
        Ok(())
    }
}
