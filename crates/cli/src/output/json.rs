//! JSON output formatting

use ruleplug::{Issue, Summary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput {
    pub issues: Vec<JsonIssue>,
    pub summary: Summary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonIssue {
    pub rule: String,
    pub severity: String,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub link: String,
    pub fixable: bool,
    pub fixed: bool,
}

impl From<&Issue> for JsonIssue {
    fn from(issue: &Issue) -> Self {
        Self {
            rule: issue.rule.name.clone(),
            severity: issue.rule.severity.to_string(),
            message: issue.message.clone(),
            file: issue.range.filename.clone(),
            line: issue.range.start.line,
            column: issue.range.start.column,
            end_line: issue.range.end.line,
            end_column: issue.range.end.column,
            link: issue.rule.link.clone(),
            fixable: issue.fixable,
            fixed: issue.fixed,
        }
    }
}

pub fn build_json_output(issues: &[Issue], summary: &Summary) -> JsonOutput {
    JsonOutput {
        issues: issues.iter().map(JsonIssue::from).collect(),
        summary: summary.clone(),
    }
}
