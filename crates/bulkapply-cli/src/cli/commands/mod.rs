//! CLI command handlers, one file per command.

mod config;
mod simulate;

pub use config::run_config;
pub use simulate::{run_simulate, SimulateOptions};
