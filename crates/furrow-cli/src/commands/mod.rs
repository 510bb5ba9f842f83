// crates/furrow-cli/src/commands/mod.rs
//
// Command module declarations for the Furrow CLI.

pub mod pending;
pub mod replay;
pub mod schedule;
