//! Starting rulesets and talking to them
//!
//! The built-in ruleset runs on a thread connected through an in-memory
//! channel. External plugins are child processes speaking the protocol on
//! their stdin and stdout.

use anyhow::{bail, Context, Result};
use ruleplug::config::PluginConfig;
use ruleplug::host::{RuleSetClient, HOST_VERSION};
use ruleplug::wire::{memory_pair, StreamTransport, Transport};
use ruleplug::{BodyContent, GlobalConfig, RuleplugConfig, Server};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use crate::rules;

/// The built-in ruleset followed by every enabled `[[plugin]]`
pub fn start_all(config: &RuleplugConfig) -> Result<Vec<Plugin>> {
    let mut plugins = vec![Plugin::builtin()?];
    for plugin in config.plugins.iter().filter(|p| p.enabled) {
        plugins.push(Plugin::launch(plugin)?);
    }
    Ok(plugins)
}

enum Worker {
    Thread(JoinHandle<ruleplug::Result<()>>),
    Process(Child),
}

/// A running ruleset
pub struct Plugin {
    pub name: String,
    pub version: String,
    client: RuleSetClient<Box<dyn Transport>>,
    worker: Worker,
}

impl Plugin {
    pub fn builtin() -> Result<Self> {
        let (host_side, plugin_side) = memory_pair();
        let handle = std::thread::Builder::new()
            .name(rules::RULESET_NAME.to_string())
            .spawn(move || ruleplug::plugin::serve(&mut rules::builtin_ruleset(), plugin_side))
            .context("failed to start the built-in ruleset")?;
        Self::connect(Box::new(host_side), Worker::Thread(handle))
    }

    pub fn launch(config: &PluginConfig) -> Result<Self> {
        let mut child = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to launch plugin {:?} ({})", config.name, config.path.display()))?;
        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            bail!("plugin {:?} has no stdio", config.name);
        };
        Self::connect(
            Box::new(StreamTransport::new(stdout, stdin)),
            Worker::Process(child),
        )
    }

    fn connect(transport: Box<dyn Transport>, worker: Worker) -> Result<Self> {
        let mut client = RuleSetClient::new(transport);
        let name = client.name().context("failed to get the plugin name")?;
        let version = client.version().context("failed to get the plugin version")?;
        let sdk_version = client.sdk_version()?;
        log::debug!("connected to {} {} (sdk {})", name, version, sdk_version);
        client
            .negotiate(HOST_VERSION)
            .with_context(|| format!("plugin {:?} is not compatible with this host", name))?;
        Ok(Self {
            name,
            version,
            client,
            worker,
        })
    }

    pub fn rule_names(&mut self) -> Result<Vec<String>> {
        Ok(self.client.rule_names()?)
    }

    pub fn configure(&mut self, global: &GlobalConfig) -> Result<()> {
        self.client
            .apply_global_config(global)
            .with_context(|| format!("failed to apply config to {:?}", self.name))?;
        self.client
            .apply_config(&BodyContent::default())
            .with_context(|| format!("failed to apply config to {:?}", self.name))?;
        Ok(())
    }

    pub fn check(&mut self, server: &mut dyn Server) -> Result<()> {
        self.client
            .check(server)
            .with_context(|| format!("failed to check with {:?}", self.name))
    }

    /// Close the channel and wait for the ruleset to stop
    pub fn shutdown(self) -> Result<()> {
        drop(self.client);
        match self.worker {
            Worker::Thread(handle) => match handle.join() {
                Ok(result) => result.with_context(|| format!("{:?} stopped with an error", self.name)),
                Err(_) => bail!("{:?} panicked", self.name),
            },
            Worker::Process(mut child) => {
                let status = child.wait()?;
                if !status.success() {
                    log::warn!("plugin {:?} exited with {}", self.name, status);
                }
                Ok(())
            }
        }
    }
}
