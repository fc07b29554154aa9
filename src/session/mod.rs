//! Chat sessions, the NDJSON bridge, and conversation history.

mod bridge;
mod runner;
mod store;

pub use bridge::*;
pub use runner::*;
pub use store::*;
