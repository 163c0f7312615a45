//! Host-side handle on a running plugin

use super::{handle, version, Server};
use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::hclext::{BodyContent, BodySchema};
use crate::wire::{Frame, PluginRequest, PluginResponse, Status, Transport, WireBodyContent};

/// Calls a plugin's ruleset over a transport.
///
/// While a call is in flight the plugin may call back into the host;
/// those callbacks are answered from the [`Server`] given to
/// [`RuleSetClient::check`]. Outside a check there is nothing to answer
/// them with and they fail.
pub struct RuleSetClient<T: Transport> {
    transport: T,
}

impl<T: Transport> RuleSetClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn request(
        &mut self,
        request: PluginRequest,
        mut server: Option<&mut dyn Server>,
    ) -> Result<PluginResponse> {
        self.transport.send(&Frame::PluginRequest(request))?;
        loop {
            match self.transport.recv()? {
                Some(Frame::PluginResponse(response)) => return Ok(response?),
                Some(Frame::HostRequest(callback)) => {
                    let response = match server.as_deref_mut() {
                        Some(server) => handle(server, callback),
                        None => Err(Status::failed_precondition(
                            "host callbacks are only served during a check",
                        )),
                    };
                    self.transport.send(&Frame::HostResponse(response))?;
                }
                Some(other) => {
                    return Err(Status::internal(format!(
                        "unexpected {} while waiting for a plugin response",
                        other.kind()
                    ))
                    .into())
                }
                None => return Err(Status::unavailable("plugin closed the channel").into()),
            }
        }
    }

    fn string(&mut self, request: PluginRequest) -> Result<String> {
        match self.request(request, None)? {
            PluginResponse::Name(s)
            | PluginResponse::Version(s)
            | PluginResponse::VersionConstraint(s)
            | PluginResponse::SdkVersion(s) => Ok(s),
            _ => Err(Status::internal("unexpected response from plugin").into()),
        }
    }

    fn empty(&mut self, request: PluginRequest, server: Option<&mut dyn Server>) -> Result<()> {
        match self.request(request, server)? {
            PluginResponse::Empty => Ok(()),
            _ => Err(Status::internal("unexpected response from plugin").into()),
        }
    }

    pub fn name(&mut self) -> Result<String> {
        self.string(PluginRequest::Name)
    }

    pub fn version(&mut self) -> Result<String> {
        self.string(PluginRequest::Version)
    }

    pub fn version_constraint(&mut self) -> Result<String> {
        self.string(PluginRequest::VersionConstraint)
    }

    pub fn sdk_version(&mut self) -> Result<String> {
        self.string(PluginRequest::SdkVersion)
    }

    pub fn rule_names(&mut self) -> Result<Vec<String>> {
        match self.request(PluginRequest::RuleNames, None)? {
            PluginResponse::RuleNames(names) => Ok(names),
            _ => Err(Status::internal("unexpected response from plugin").into()),
        }
    }

    pub fn config_schema(&mut self) -> Result<BodySchema> {
        match self.request(PluginRequest::ConfigSchema, None)? {
            PluginResponse::ConfigSchema(schema) => Ok(schema),
            _ => Err(Status::internal("unexpected response from plugin").into()),
        }
    }

    /// Ask for the plugin's constraint and check `host_version` against it
    pub fn negotiate(&mut self, host_version: &str) -> Result<()> {
        let constraint = self.version_constraint()?;
        if !version::satisfies(host_version, &constraint)? {
            let name = self.name()?;
            return Err(Error::Version(format!(
                "{} requires host version {}, but this host is {}",
                name, constraint, host_version
            )));
        }
        Ok(())
    }

    pub fn apply_global_config(&mut self, config: &GlobalConfig) -> Result<()> {
        self.empty(PluginRequest::ApplyGlobalConfig(config.clone()), None)
    }

    pub fn apply_config(&mut self, content: &BodyContent) -> Result<()> {
        self.empty(
            PluginRequest::ApplyConfig(WireBodyContent::from(content)),
            None,
        )
    }

    /// Run the plugin's rules, answering its callbacks from `server`
    pub fn check(&mut self, server: &mut dyn Server) -> Result<()> {
        log::debug!("starting check");
        self.empty(PluginRequest::Check, Some(server))
    }
}
