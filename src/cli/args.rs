//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pavilion - HPC test harness
///
/// Creates test instances, builds them through a shared content-addressed
/// build cache and runs them.
#[derive(Parser, Debug)]
#[command(name = "pav")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Site configuration file path
    #[arg(short, long, global = true, env = "PAV_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a test instance from a test config file
    Create(CreateArgs),

    /// Build a test, reusing a cached build when one exists
    Build(BuildArgs),

    /// Build a test and run it with its scheduler
    Run(RunArgs),

    /// Show the current status of tests
    Status(StatusArgs),

    /// List all test instances
    List(ListArgs),

    /// Show or initialize site configuration
    Config(ConfigArgs),
}

/// Arguments for the create command
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Test config file (.toml, or .json)
    pub file: PathBuf,

    /// Build the test right after creating it
    #[arg(short, long)]
    pub build: bool,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Test id (e.g. 7 or 000007)
    pub id: String,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test id (e.g. 7 or 000007)
    pub id: String,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Test ids (all tests if none given)
    pub ids: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_status_with_ids() {
        let cli = Cli::try_parse_from(["pav", "-vv", "status", "1", "000002", "--format", "json"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.ids, vec!["1", "000002"]);
                assert!(matches!(args.format, OutputFormat::Json));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["pav", "list", "--config", "/etc/pav.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/pav.toml")));
    }

    #[test]
    fn create_requires_file() {
        assert!(Cli::try_parse_from(["pav", "create"]).is_err());
    }
}
