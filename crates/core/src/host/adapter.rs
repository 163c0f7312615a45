//! Translation of wire requests into [`Server`] calls

use super::Server;
use crate::issue::Issue;
use crate::wire::{HostRequest, HostResponse, Status, WireBodyContent};

fn precondition(e: impl std::fmt::Display) -> Status {
    Status::failed_precondition(e.to_string())
}

/// Answer one plugin callback.
///
/// Missing required fields are `InvalidArgument`, failures inside the
/// server are `FailedPrecondition`, and a missing file or rule
/// configuration is `NotFound`.
pub fn handle(server: &mut dyn Server, request: HostRequest) -> Result<HostResponse, Status> {
    match request {
        HostRequest::GetModulePath => server
            .get_module_path()
            .map(HostResponse::ModulePath)
            .map_err(precondition),
        HostRequest::GetOriginalwd => server
            .get_originalwd()
            .map(HostResponse::Originalwd)
            .map_err(precondition),
        HostRequest::GetModuleContent { schema, option } => {
            let content = server
                .get_module_content(&schema, &option)
                .map_err(precondition)?;
            Ok(HostResponse::ModuleContent(WireBodyContent::from(&content)))
        }
        HostRequest::GetFile { name } => {
            if name.is_empty() {
                return Err(Status::invalid_argument("name should not be empty"));
            }
            match server.get_file(&name).map_err(precondition)? {
                Some(bytes) => Ok(HostResponse::File(bytes)),
                None => Err(Status::not_found(format!("file not found: {}", name))),
            }
        }
        HostRequest::GetFiles { module_ctx } => server
            .get_files(module_ctx)
            .map(HostResponse::Files)
            .map_err(precondition),
        HostRequest::GetRuleConfigContent { name, schema } => {
            if name.is_empty() {
                return Err(Status::invalid_argument("name should not be empty"));
            }
            match server
                .get_rule_config_content(&name, &schema)
                .map_err(precondition)?
            {
                Some((content, sources)) => Ok(HostResponse::RuleConfigContent {
                    content: WireBodyContent::from(&content),
                    sources,
                }),
                None => Err(Status::not_found(format!("rule config not found: {}", name))),
            }
        }
        HostRequest::EvaluateExpr { expr, option } => {
            if expr.bytes.is_empty() {
                return Err(Status::invalid_argument("expr should not be empty"));
            }
            if expr.range.filename.is_empty() {
                return Err(Status::invalid_argument("expr range should have a filename"));
            }
            let parsed = expr
                .rehydrate()
                .map_err(|diags| Status::invalid_argument(diags.to_string()))?;
            server
                .evaluate_expr(&parsed, &option)
                .map(HostResponse::Value)
                .map_err(precondition)
        }
        HostRequest::EmitIssue {
            rule,
            message,
            range,
            fixable,
        } => {
            if rule.name.is_empty() {
                return Err(Status::invalid_argument("rule should have a name"));
            }
            let issue = Issue {
                rule,
                message,
                range,
                fixable,
                fixed: false,
            };
            server
                .emit_issue(issue)
                .map(HostResponse::IssueApplied)
                .map_err(precondition)
        }
        HostRequest::ApplyChanges { changes } => server
            .apply_changes(changes)
            .map(|()| HostResponse::Empty)
            .map_err(precondition),
    }
}
