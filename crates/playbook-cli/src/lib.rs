pub mod commands;
pub mod error;
pub mod output;

pub use commands::{
    ConfigCommand, ListCommand, MergeCommand, SelectCommand, ShowCommand, StatsCommand, Workspace,
};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_tags, truncate_string};
