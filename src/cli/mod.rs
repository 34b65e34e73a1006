//! CLI command implementations

pub mod error;
pub mod fetch;
pub mod render;

pub use error::CliError;
pub use fetch::{Cli, Commands, FetchArgs, OutputFormat};
pub use render::ProgressRenderer;
