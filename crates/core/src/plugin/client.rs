//! [`Runner`] backed by calls to the host

use super::{rule_identity, Rule, Runner};
use crate::error::{Error, Result};
use crate::fixer::Fixer;
use crate::hclext::{BodyContent, BodySchema};
use crate::syntax::{parse_file, Expression, File, Range};
use crate::value::Value;
use crate::wire::{
    Code, EvaluateExprOption, Frame, GetModuleContentOption, HostRequest, HostResponse,
    ModuleCtx, Status, Transport, WireExpression,
};
use std::collections::BTreeMap;

pub struct Client<'a> {
    transport: &'a mut dyn Transport,
    fixer: Fixer,
    fix_enabled: bool,
}

impl<'a> Client<'a> {
    /// Connect a runner for one check. The fixer starts from the root
    /// module's files as the host has them.
    pub fn new(transport: &'a mut dyn Transport, fix_enabled: bool) -> Result<Self> {
        let mut client = Self {
            transport,
            fixer: Fixer::new(BTreeMap::new()),
            fix_enabled,
        };
        let files = client.file_bytes(ModuleCtx::Root)?;
        client.fixer = Fixer::new(files);
        Ok(client)
    }

    pub fn fixer(&self) -> &Fixer {
        &self.fixer
    }

    fn call(&mut self, request: HostRequest) -> Result<HostResponse> {
        self.transport.send(&Frame::HostRequest(request))?;
        match self.transport.recv()? {
            Some(Frame::HostResponse(response)) => Ok(response?),
            Some(other) => Err(Status::internal(format!(
                "unexpected {} while waiting for a host response",
                other.kind()
            ))
            .into()),
            None => Err(Status::unavailable("host closed the channel").into()),
        }
    }

    /// Like `call`, with NotFound turned into `None`
    fn call_optional(&mut self, request: HostRequest) -> Result<Option<HostResponse>> {
        match self.call(request) {
            Ok(response) => Ok(Some(response)),
            Err(Error::Status(status)) if status.code == Code::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn file_bytes(&mut self, module_ctx: ModuleCtx) -> Result<BTreeMap<String, Vec<u8>>> {
        match self.call(HostRequest::GetFiles { module_ctx })? {
            HostResponse::Files(files) => Ok(files),
            other => Err(unexpected(&other)),
        }
    }

    fn send_issue(
        &mut self,
        rule: &dyn Rule,
        message: &str,
        range: &Range,
        fixable: bool,
    ) -> Result<bool> {
        let request = HostRequest::EmitIssue {
            rule: rule_identity(rule),
            message: message.to_string(),
            range: range.clone(),
            fixable,
        };
        match self.call(request)? {
            HostResponse::IssueApplied(applied) => Ok(applied),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &HostResponse) -> Error {
    let name = match response {
        HostResponse::ModulePath(_) => "module path",
        HostResponse::Originalwd(_) => "working directory",
        HostResponse::ModuleContent(_) => "module content",
        HostResponse::File(_) => "file",
        HostResponse::Files(_) => "files",
        HostResponse::RuleConfigContent { .. } => "rule config content",
        HostResponse::Value(_) => "value",
        HostResponse::IssueApplied(_) => "issue result",
        HostResponse::Empty => "empty",
    };
    Status::internal(format!("unexpected {} response from host", name)).into()
}

impl Runner for Client<'_> {
    fn get_module_path(&mut self) -> Result<Vec<String>> {
        match self.call(HostRequest::GetModulePath)? {
            HostResponse::ModulePath(path) => Ok(path),
            other => Err(unexpected(&other)),
        }
    }

    fn get_originalwd(&mut self) -> Result<String> {
        match self.call(HostRequest::GetOriginalwd)? {
            HostResponse::Originalwd(dir) => Ok(dir),
            other => Err(unexpected(&other)),
        }
    }

    fn get_module_content(
        &mut self,
        schema: &BodySchema,
        option: &GetModuleContentOption,
    ) -> Result<BodyContent> {
        let request = HostRequest::GetModuleContent {
            schema: schema.clone(),
            option: option.clone(),
        };
        match self.call(request)? {
            HostResponse::ModuleContent(content) => Ok(content.rehydrate()?),
            other => Err(unexpected(&other)),
        }
    }

    fn get_file(&mut self, name: &str) -> Result<Option<File>> {
        let request = HostRequest::GetFile {
            name: name.to_string(),
        };
        match self.call_optional(request)? {
            None => Ok(None),
            Some(HostResponse::File(bytes)) => Ok(Some(parse_file(&bytes, name)?)),
            Some(other) => Err(unexpected(&other)),
        }
    }

    fn get_files(&mut self) -> Result<BTreeMap<String, File>> {
        let mut files = BTreeMap::new();
        for (name, bytes) in self.file_bytes(ModuleCtx::SelfModule)? {
            let file = parse_file(&bytes, &name)?;
            files.insert(name, file);
        }
        Ok(files)
    }

    fn get_rule_config_content(
        &mut self,
        rule_name: &str,
        schema: &BodySchema,
    ) -> Result<Option<BodyContent>> {
        let request = HostRequest::GetRuleConfigContent {
            name: rule_name.to_string(),
            schema: schema.clone(),
        };
        match self.call_optional(request)? {
            None => Ok(None),
            Some(HostResponse::RuleConfigContent { content, .. }) => Ok(Some(content.rehydrate()?)),
            Some(other) => Err(unexpected(&other)),
        }
    }

    fn evaluate_expr_value(
        &mut self,
        expr: &Expression,
        option: &EvaluateExprOption,
    ) -> Result<Value> {
        let request = HostRequest::EvaluateExpr {
            expr: WireExpression::from(expr),
            option: option.clone(),
        };
        match self.call(request)? {
            HostResponse::Value(value) => Ok(value),
            other => Err(unexpected(&other)),
        }
    }

    fn emit_issue(&mut self, rule: &dyn Rule, message: &str, range: &Range) -> Result<()> {
        self.send_issue(rule, message, range, false).map(|_| ())
    }

    fn emit_issue_with_fix(
        &mut self,
        rule: &dyn Rule,
        message: &str,
        range: &Range,
        fix: &mut dyn FnMut(&mut Fixer) -> Result<()>,
    ) -> Result<()> {
        if !self.get_module_path()?.is_empty() {
            return self.emit_issue(rule, message, range);
        }

        self.fixer.stash_changes();
        match fix(&mut self.fixer) {
            Ok(()) => {}
            Err(Error::FixNotSupported) => {
                self.fixer.pop_changes_from_stash();
                return self.emit_issue(rule, message, range);
            }
            Err(e) => {
                self.fixer.pop_changes_from_stash();
                return Err(e);
            }
        }

        let applied = self.send_issue(rule, message, range, true)?;
        if !applied || !self.fix_enabled {
            self.fixer.pop_changes_from_stash();
        }
        Ok(())
    }

    fn apply_changes(&mut self) -> Result<()> {
        if !self.fixer.has_changes() {
            return Ok(());
        }
        self.fixer.format_changes();
        let changes = self.fixer.changes().clone();
        log::debug!("sending fixes for {} file(s)", changes.len());
        match self.call(HostRequest::ApplyChanges { changes })? {
            HostResponse::Empty => {
                self.fixer.apply_changes();
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }
}
