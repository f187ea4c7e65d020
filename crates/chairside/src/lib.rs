pub mod cli;
pub mod commands;
pub mod output;

pub use chairside_core::{bridge, config, registry, utils};
