//! CLI domain: parse and route only.

mod parse;
mod route;

pub use parse::{Cli, Commands, OutputFormat};
pub use route::{CommandOutput, RunContext};
