//! Top-level MCP lifecycle commands

pub(crate) const INITIALIZE: &str = "initialize";
pub(crate) const PING: &str = "ping";
