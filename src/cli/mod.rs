//! CLI module for Claude Code process spawning and the stream-json protocol.

mod events;
mod outbound;
mod process;
mod stream;

pub use events::*;
pub use outbound::*;
pub use process::*;
pub use stream::*;
