//! Serve the built-in ruleset as a plugin process

use anyhow::Result;

use crate::rules;

pub fn run() -> Result<()> {
    log::debug!("serving {} over stdio", rules::RULESET_NAME);
    ruleplug::plugin::serve_stdio(&mut rules::builtin_ruleset())?;
    Ok(())
}
