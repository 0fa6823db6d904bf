//! Tooling layer: command-line parsing and dispatch.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, DeviceCommands};
