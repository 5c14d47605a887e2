//! Device backend over shell commands.
//!
//! [`ShellDevice`] implements the registry, privileged-capability and
//! activity-host traits by running `pm`, `cmd package`, `am`, `ps` and
//! `dumpsys`, either through `adb shell` from a host or with `sh -c` on the
//! device itself.

pub mod command;
pub mod parse;
mod runner;
mod shell;

pub use runner::{AdbRunner, CommandOutput, CommandRunner, LocalRunner, RunnerError, shell_quote};
pub use shell::ShellDevice;
