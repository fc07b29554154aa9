//! CLI protocol tests.

mod events_test;
mod process_test;
