//! Claude Chat Bridge - chat sessions over the Claude Code stream-json protocol.

pub mod cli;
pub mod config;
pub mod display;
pub mod pipeline;
pub mod session;
