//! External command execution seam and the host command lines.

pub mod nmcli;
pub mod runner;

pub use runner::{CommandOutput, CommandRunner, ShellRunner};
