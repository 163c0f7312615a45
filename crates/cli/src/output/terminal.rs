//! Terminal output formatting

use colored::Colorize;
use ruleplug::{Issue, Severity, Summary};

pub fn format_issue(issue: &Issue) -> String {
    let severity = match issue.rule.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Notice => "notice".blue().bold(),
    };
    let fixed = if issue.fixed {
        format!(" {}", "(fixed)".green())
    } else {
        String::new()
    };
    let mut line = format!(
        "  {}: {} ({}){}\n    {} {}:{}",
        severity,
        issue.message,
        issue.rule.name.dimmed(),
        fixed,
        "at".dimmed(),
        issue.range.filename,
        issue.range.start.line,
    );
    if !issue.rule.link.is_empty() {
        line.push_str(&format!("\n    {} {}", "see".dimmed(), issue.rule.link));
    }
    line
}

pub fn format_summary(summary: &Summary) -> String {
    format!(
        "  {} \u{00b7} {} \u{00b7} {} \u{00b7} {}\n  {} files analyzed",
        format!("{} error(s)", summary.errors).red(),
        format!("{} warning(s)", summary.warnings).yellow(),
        format!("{} notice(s)", summary.notices).blue(),
        format!("{} fixed", summary.fixed).green(),
        summary.files_analyzed
    )
}
