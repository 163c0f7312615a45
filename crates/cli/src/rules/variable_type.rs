use ruleplug::wire::GetModuleContentOption;
use ruleplug::{BodySchema, Result, Rule, Runner, Severity};

/// Every variable should declare its type
pub struct TerraformVariableType;

impl Rule for TerraformVariableType {
    fn name(&self) -> &str {
        "terraform_variable_type"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema =
            BodySchema::new().block("variable", &["name"], BodySchema::new().attribute("type"));
        let content = runner.get_module_content(&schema, &GetModuleContentOption::default())?;
        for block in content.blocks_of_type("variable") {
            if block.body.attributes.contains_key("type") {
                continue;
            }
            let name = block.labels.first().map(String::as_str).unwrap_or_default();
            runner.emit_issue(
                self,
                &format!("`{}` variable has no type", name),
                &block.def_range,
            )?;
        }
        Ok(())
    }
}
