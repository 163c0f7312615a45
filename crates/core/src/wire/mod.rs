//! Messages exchanged between a host and a plugin
//!
//! Host and plugin talk over a single duplex [`Transport`]. The host sends
//! [`PluginRequest`]s and waits for the matching response. While a
//! [`PluginRequest::Check`] is running, the plugin calls back into the host
//! with [`HostRequest`]s on the same channel, so the host keeps serving
//! those until the check's own response arrives.

mod proto;
mod transport;

pub use proto::{WireAttribute, WireBlock, WireBodyContent, WireExpression};
pub use transport::{memory_pair, MemoryTransport, StreamTransport, Transport};

use crate::config::GlobalConfig;
use crate::hclext::BodySchema;
use crate::issue::RuleIdentity;
use crate::syntax::Range;
use crate::value::{Type, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status codes carried by failed calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Code {
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    Aborted,
    /// Codec failures and protocol violations
    Internal,
    /// The channel is gone
    Unavailable,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::InvalidArgument => "InvalidArgument",
            Code::FailedPrecondition => "FailedPrecondition",
            Code::NotFound => "NotFound",
            Code::Aborted => "Aborted",
            Code::Internal => "Internal",
            Code::Unavailable => "Unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("rpc error: code = {code} desc = {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(Code::Aborted, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

/// Which module an operation resolves against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleCtx {
    /// The module being inspected
    #[default]
    SelfModule,
    Root,
}

/// Whether `count`/`for_each` blocks are expanded into instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpandMode {
    #[default]
    Expand,
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetModuleContentHint {
    /// Narrows the lookup to resources of one type
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetModuleContentOption {
    pub module_ctx: ModuleCtx,
    pub expand_mode: ExpandMode,
    pub hint: GetModuleContentHint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateExprOption {
    /// Overrides the type implied by the decode target
    pub want_type: Option<Type>,
    pub module_ctx: ModuleCtx,
}

/// Calls the host makes on the plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PluginRequest {
    Name,
    Version,
    VersionConstraint,
    SdkVersion,
    RuleNames,
    ConfigSchema,
    ApplyGlobalConfig(GlobalConfig),
    ApplyConfig(WireBodyContent),
    Check,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PluginResponse {
    Name(String),
    Version(String),
    VersionConstraint(String),
    SdkVersion(String),
    RuleNames(Vec<String>),
    ConfigSchema(BodySchema),
    Empty,
}

/// Calls the plugin makes on the host during a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostRequest {
    GetModulePath,
    GetOriginalwd,
    GetModuleContent {
        schema: BodySchema,
        option: GetModuleContentOption,
    },
    GetFile {
        name: String,
    },
    GetFiles {
        module_ctx: ModuleCtx,
    },
    GetRuleConfigContent {
        name: String,
        schema: BodySchema,
    },
    EvaluateExpr {
        expr: WireExpression,
        option: EvaluateExprOption,
    },
    EmitIssue {
        rule: RuleIdentity,
        message: String,
        range: Range,
        fixable: bool,
    },
    ApplyChanges {
        changes: BTreeMap<String, Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostResponse {
    /// Empty for the root module
    ModulePath(Vec<String>),
    Originalwd(String),
    ModuleContent(WireBodyContent),
    File(Vec<u8>),
    Files(BTreeMap<String, Vec<u8>>),
    RuleConfigContent {
        content: WireBodyContent,
        sources: BTreeMap<String, Vec<u8>>,
    },
    Value(Value),
    /// Whether the host accepted the issue's fix
    IssueApplied(bool),
    Empty,
}

/// One message on the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    PluginRequest(PluginRequest),
    PluginResponse(Result<PluginResponse, Status>),
    HostRequest(HostRequest),
    HostResponse(Result<HostResponse, Status>),
}

impl Frame {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Frame::PluginRequest(_) => "plugin request",
            Frame::PluginResponse(_) => "plugin response",
            Frame::HostRequest(_) => "host request",
            Frame::HostResponse(_) => "host response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = Status::aborted("failed to check \"x\" rule: boom");
        assert_eq!(
            status.to_string(),
            "rpc error: code = Aborted desc = failed to check \"x\" rule: boom"
        );
    }

    #[test]
    fn test_default_options() {
        let option = GetModuleContentOption::default();
        assert_eq!(option.module_ctx, ModuleCtx::SelfModule);
        assert_eq!(option.expand_mode, ExpandMode::Expand);
        assert!(EvaluateExprOption::default().want_type.is_none());
    }
}
