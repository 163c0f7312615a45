//! CLI commands

pub mod check;
pub mod init;
pub mod plugin;
pub mod rules;
