use ruleplug::fixer::Fixer;
use ruleplug::syntax::scanner::Scanner;
use ruleplug::syntax::{Pos, Range, SyntaxKind};
use ruleplug::{Result, Rule, Runner, Severity};

/// Single line comments should use `//` rather than `#`
pub struct TerraformCommentSyntax;

impl Rule for TerraformCommentSyntax {
    fn name(&self) -> &str {
        "terraform_comment_syntax"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<()> {
        for (name, file) in runner.get_files()? {
            if file.syntax() == SyntaxKind::Json {
                continue;
            }
            let scanner = Scanner::new(file.bytes(), &name)?;
            for token in scanner.tokens() {
                if !token.is_line_comment() || !token.text.starts_with('#') {
                    continue;
                }
                let start = token.range.start;
                let hash = Range::new(
                    name.as_str(),
                    start,
                    Pos::new(start.line, start.column + 1, start.byte + 1),
                );
                runner.emit_issue_with_fix(
                    self,
                    "Single line comments should begin with //",
                    &token.range,
                    &mut |fixer: &mut Fixer| fixer.replace_text(&hash, ["//"]),
                )?;
            }
        }
        Ok(())
    }
}
