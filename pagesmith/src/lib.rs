pub mod cli;
pub mod github;
pub mod llm;
pub mod load_config;
pub mod logging;

pub use cli::{run, Cli, Commands};
