//! CLI command implementations

pub mod collect;
pub mod error;
pub mod sources;

pub use collect::{Cli, CollectArgs, Commands};
pub use error::CliError;
pub use sources::SourcesCommand;
