use ruleplug::fixer::Fixer;
use ruleplug::wire::GetModuleContentOption;
use ruleplug::{BodySchema, Result, Rule, Runner, Severity};

/// `locals {}` blocks that declare nothing
pub struct TerraformEmptyLocals;

impl Rule for TerraformEmptyLocals {
    fn name(&self) -> &str {
        "terraform_empty_locals"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        let schema = BodySchema::new().block("locals", &[], BodySchema::just_attributes());
        let content = runner.get_module_content(&schema, &GetModuleContentOption::default())?;
        for block in content.blocks_of_type("locals") {
            if !block.body.attributes.is_empty() {
                continue;
            }
            runner.emit_issue_with_fix(
                self,
                "locals block declares no values",
                &block.def_range,
                &mut |fixer: &mut Fixer| fixer.remove_block(block),
            )?;
        }
        Ok(())
    }
}
