//! Message pipeline: stream records in, UI events out.

mod conversation;
mod edits;
mod files;
mod metrics;
mod permission;
mod processor;
mod totals;
mod ui;

pub use conversation::*;
pub use edits::*;
pub use files::*;
pub use metrics::*;
pub use permission::*;
pub use processor::*;
pub use totals::*;
pub use ui::*;
