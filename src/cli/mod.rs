//! CLI module for punctprep - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running, inspecting and
//! configuring the data-preparation invocation.

pub mod commands;

pub use commands::{Cli, Commands, ShowFormat};
