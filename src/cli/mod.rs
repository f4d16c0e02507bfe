//! Command-line interface for owl-gaia.
//!
//! A single command: provision models, assemble toolkits and run the GAIA
//! benchmark with the user/assistant society.

mod commands;

pub use commands::{assemble_tools, build_agent_params, parse_cli, run, run_with_cli, Cli};
