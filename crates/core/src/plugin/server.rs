//! Serving a ruleset to the host

use super::{Client, RuleSet, SDK_VERSION};
use crate::error::Result;
use crate::wire::{Frame, PluginRequest, PluginResponse, Status, StreamTransport, Transport};

struct Session {
    /// Set once the host asked for the version constraint
    negotiated: bool,
    fix: bool,
}

/// Answer host requests until the host closes the channel
pub fn serve(ruleset: &mut dyn RuleSet, mut transport: impl Transport) -> Result<()> {
    let mut session = Session {
        negotiated: false,
        fix: false,
    };
    log::debug!("serving ruleset {} {}", ruleset.name(), ruleset.version());
    while let Some(frame) = transport.recv()? {
        let response = match frame {
            Frame::PluginRequest(request) => {
                dispatch(ruleset, &mut session, &mut transport, request)
            }
            other => Err(Status::internal(format!(
                "unexpected {} while waiting for a plugin request",
                other.kind()
            ))),
        };
        if let Err(status) = &response {
            log::debug!("request failed: {}", status);
        }
        transport.send(&Frame::PluginResponse(response))?;
    }
    log::debug!("host closed the channel");
    Ok(())
}

/// Serve over this process's stdin and stdout
pub fn serve_stdio(ruleset: &mut dyn RuleSet) -> Result<()> {
    serve(
        ruleset,
        StreamTransport::new(std::io::stdin(), std::io::stdout()),
    )
}

fn dispatch(
    ruleset: &mut dyn RuleSet,
    session: &mut Session,
    transport: &mut dyn Transport,
    request: PluginRequest,
) -> Result<PluginResponse, Status> {
    match request {
        PluginRequest::Name => Ok(PluginResponse::Name(ruleset.name().to_string())),
        PluginRequest::Version => Ok(PluginResponse::Version(ruleset.version().to_string())),
        PluginRequest::VersionConstraint => {
            session.negotiated = true;
            Ok(PluginResponse::VersionConstraint(
                ruleset.version_constraint().to_string(),
            ))
        }
        PluginRequest::SdkVersion => Ok(PluginResponse::SdkVersion(SDK_VERSION.to_string())),
        PluginRequest::RuleNames => Ok(PluginResponse::RuleNames(ruleset.rule_names())),
        PluginRequest::ConfigSchema => Ok(PluginResponse::ConfigSchema(ruleset.config_schema())),
        PluginRequest::ApplyGlobalConfig(config) => {
            let constraint = ruleset.version_constraint();
            if !session.negotiated && !constraint.is_empty() {
                return Err(Status::failed_precondition(format!(
                    "failed to satisfy version constraint; {} requires {}, but the host does not support version negotiation",
                    ruleset.name(),
                    constraint
                )));
            }
            session.fix = config.fix;
            ruleset
                .apply_global_config(&config)
                .map_err(|e| Status::failed_precondition(e.to_string()))?;
            Ok(PluginResponse::Empty)
        }
        PluginRequest::ApplyConfig(content) => {
            let content = content
                .rehydrate()
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            ruleset
                .apply_config(&content)
                .map_err(|e| Status::failed_precondition(e.to_string()))?;
            Ok(PluginResponse::Empty)
        }
        PluginRequest::Check => {
            let mut client = Client::new(transport, session.fix)
                .map_err(|e| Status::failed_precondition(e.to_string()))?;
            ruleset
                .check(&mut client)
                .map_err(|e| Status::aborted(e.to_string()))?;
            Ok(PluginResponse::Empty)
        }
    }
}
